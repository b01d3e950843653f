use std::{io, iter};

use log::{debug, info, warn};
use rand::Rng;

use super::{Snapshot, TrainSummary, TrainerConfig, ValidRecord};
use crate::{
    MlErr, Result,
    arch::{Model, Regularization, loss::LossFn},
    dataset::Dataset,
    optimization::{LrSchedule, Optimizer},
};

/// A step-based model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself.
///
/// Training runs for a fixed amount of optimizer steps, reshuffling the training set each time
/// its batches are exhausted, and keeps the parameters with the lowest validation loss.
pub struct Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    optimizer: O,
    loss_fn: L,
    reg: Regularization,
    schedule: LrSchedule,
    cfg: TrainerConfig,
    rng: R,

    base_lr: f32,
    grad: Vec<f32>,
}

impl<M, O, L, R> Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer, its current learning rate is the base of the schedule.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `cfg` - The batch size and step counts of the run.
    /// * `rng` - A random number generator, used for shuffling the training set.
    pub fn new(model: M, optimizer: O, loss_fn: L, cfg: TrainerConfig, rng: R) -> Result<Self> {
        cfg.validate()?;

        Ok(Self {
            grad: vec![0.0; model.size()],
            base_lr: optimizer.learning_rate(),
            model,
            optimizer,
            loss_fn,
            reg: Regularization::None,
            schedule: LrSchedule::Constant,
            cfg,
            rng,
        })
    }

    /// Penalizes the weights of the model during training.
    pub fn with_regularization(mut self, reg: Regularization) -> Result<Self> {
        reg.validate()?;
        self.reg = reg;
        Ok(self)
    }

    /// Scales the base learning rate on every step.
    pub fn with_schedule(mut self, schedule: LrSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn model(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Trains the model, updating `params` in place.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, left as they were after the last step.
    /// * `train_set` - The samples to fit, shuffled along the way.
    /// * `valid_set` - The held out samples, the training set is used if it's empty.
    /// * `on_save` - Called every `save_steps` steps with the best parameters so far.
    ///
    /// # Returns
    /// The summary of the run, or an error if the loss stops being finite.
    pub fn train<F>(
        &mut self,
        params: &mut [f32],
        train_set: &mut Dataset,
        valid_set: &Dataset,
        mut on_save: F,
    ) -> Result<TrainSummary>
    where
        F: FnMut(&Snapshot) -> io::Result<()>,
    {
        if params.len() != self.model.size() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: self.model.size(),
            });
        }

        if train_set.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let fallback;
        let valid_set = if valid_set.is_empty() {
            warn!("empty validation set, validating on the training set");
            fallback = train_set.clone();
            &fallback
        } else {
            valid_set
        };

        let TrainerConfig {
            batch_size,
            total_steps,
            valid_steps,
            save_steps,
            early_stop,
        } = self.cfg;

        let mut best: Option<Snapshot> = None;
        let mut history = Vec::new();
        let mut stale = 0;
        let mut stopped_early = false;

        let (mut batch, mut num_batches) = (0, 0);
        let (mut loss_sum, mut loss_count) = (0.0, 0);
        let mut step = 0;

        while step < total_steps {
            if batch == num_batches {
                train_set.shuffle(&mut self.rng);
                num_batches = train_set.num_batches(batch_size, true);
                batch = 0;
            }

            let (x, y) = train_set
                .batch(batch, batch_size)
                .ok_or(MlErr::EmptyDataset)?;
            batch += 1;

            let lr = self.base_lr * self.schedule.factor(step);
            self.optimizer.set_learning_rate(lr);

            let loss = self.model.backprop(
                params,
                &mut self.grad,
                &mut self.optimizer,
                &self.loss_fn,
                &self.reg,
                iter::once((x, y)),
            )?;
            step += 1;

            if !loss.is_finite() {
                return Err(MlErr::Divergence { step });
            }

            debug!(step = step, lr = lr; "batch loss {loss:.5}");
            loss_sum += loss;
            loss_count += 1;

            if step % valid_steps == 0 || step == total_steps {
                let valid_loss = evaluate(&mut self.model, params, valid_set, &self.loss_fn)?;
                if !valid_loss.is_finite() {
                    return Err(MlErr::Divergence { step });
                }

                let train_loss = loss_sum / loss_count as f32;
                (loss_sum, loss_count) = (0.0, 0);
                history.push(ValidRecord {
                    step,
                    train_loss,
                    valid_loss,
                });

                if best.as_ref().is_none_or(|b| valid_loss < b.valid_loss) {
                    info!(
                        "step {step}: train loss {train_loss:.5}, valid loss {valid_loss:.5}, new best"
                    );
                    best = Some(Snapshot {
                        params: params.to_vec(),
                        step,
                        valid_loss,
                    });
                    stale = 0;
                } else {
                    stale += 1;
                    info!(
                        "step {step}: train loss {train_loss:.5}, valid loss {valid_loss:.5}, no improvement for {stale} validations"
                    );
                }

                stopped_early = early_stop.is_some_and(|patience| stale >= patience);
            }

            if let (Some(every), Some(best)) = (save_steps, &best) {
                if step % every == 0 {
                    debug!(step = step; "saving best parameters");
                    on_save(best)?;
                }
            }

            if stopped_early {
                info!("early stopping at step {step}");
                break;
            }
        }

        // The last step is always validated, so there is always a best snapshot.
        let best = best.ok_or(MlErr::EmptyDataset)?;
        info!(
            "training finished after {step} steps, best valid loss {:.5} at step {}",
            best.valid_loss, best.step
        );

        Ok(TrainSummary {
            best,
            steps_run: step,
            history,
            stopped_early,
        })
    }
}

/// Computes the loss of the model over a whole dataset, without any regularization term.
pub fn evaluate<M, L>(model: &mut M, params: &[f32], dataset: &Dataset, loss_fn: &L) -> Result<f32>
where
    M: Model + ?Sized,
    L: LossFn,
{
    if dataset.is_empty() {
        return Err(MlErr::EmptyDataset);
    }

    let y_pred = model.forward(params, dataset.x())?;
    if y_pred.dim() != dataset.y().dim() {
        return Err(MlErr::InvalidShape(format!(
            "prediction has shape {:?} but the targets have shape {:?}",
            y_pred.dim(),
            dataset.y().dim()
        )));
    }

    Ok(loss_fn.loss(y_pred.view(), dataset.y()))
}
