use std::{cell::RefCell, fs::File, io, path::Path, rc::Rc};

use csv::WriterBuilder;
use log::{info, warn};
use machine_learning::{
    arch::{Model, loss::Mse},
    dataset::Dataset,
    training::{TrainSummary, Trainer},
};
use ndarray::{ArrayView1, Axis};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    ForecastErr, Result,
    builder::ForecastBuilder,
    checkpoint::Checkpoint,
    config::Config,
    data::{CovidTable, Standardizer},
    report::Report,
};

/// The result of a training run.
#[derive(Debug)]
pub struct TrainOutcome {
    pub summary: TrainSummary,
    pub report: Report,
}

/// A row of the predictions file.
#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    id: &'a str,
    tested_positive: f32,
}

/// Trains a regressor on the training table and persists the best parameters found.
///
/// The checkpoint at `output.checkpoint_path` is refreshed every `training.save_steps` steps
/// and once more when training ends.
pub fn train(config: &Config) -> Result<TrainOutcome> {
    config.validate()?;

    info!("loading training data from {}", config.data.train_path.display());
    let table = CovidTable::from_path(&config.data.train_path, true)?;
    let features = config.data.features.resolve(table.headers())?;
    info!("{} rows, {} features selected", table.len(), features.len());

    let targets = table.targets().ok_or(ForecastErr::EmptyTable)?;
    let x = table.features().select(Axis(1), &features);
    let y = targets.insert_axis(Axis(1));

    let dataset = Dataset::from_xy(x.view(), y)?;
    let (mut train_set, mut valid_set) = dataset.split_by_index(config.data.valid_fold)?;
    info!(
        "{} training rows, {} validation rows",
        train_set.len(),
        valid_set.len()
    );

    let standardizer = if config.data.normalize {
        let columns = Standardizer::default_columns(&features);
        let standardizer = Standardizer::fit(train_set.x(), columns)?;
        standardizer.transform(train_set.x_mut())?;
        if !valid_set.is_empty() {
            standardizer.transform(valid_set.x_mut())?;
        }
        Some(standardizer)
    } else {
        None
    };

    let builder = ForecastBuilder::new();
    let dims = builder.layer_dims(features.len(), &config.model.hidden);
    let model = builder.build_model(&dims, config.model.activation)?;

    let rng = Rc::new(RefCell::new(builder.generate_rng(config.training.seed)));
    let mut params = builder.init_params(&dims, config.model.init, &rng)?;
    let shuffle_rng = StdRng::from_rng(&mut *rng.borrow_mut());

    let optimizer = builder.build_optimizer(config.optimizer, model.size());
    let mut trainer = Trainer::new(model, optimizer, Mse, config.trainer_config(), shuffle_rng)?
        .with_regularization(config.regularization.into())?
        .with_schedule(config.lr_schedule());

    let mut checkpoint = Checkpoint {
        layers: dims,
        activation: config.model.activation,
        features,
        standardizer,
        params: Vec::new(),
        valid_loss: f32::INFINITY,
        step: 0,
    };

    let path = &config.output.checkpoint_path;
    let summary = trainer.train(&mut params, &mut train_set, &valid_set, |best| {
        checkpoint.update(best);
        info!(
            "saving model from step {} with valid loss {:.5}",
            best.step, best.valid_loss
        );
        checkpoint.save(path).map_err(io::Error::from)
    })?;

    checkpoint.update(&summary.best);
    checkpoint.save(path)?;
    info!("best model saved to {}", path.display());

    let report = Report::new(summary.best.valid_loss);
    info!("{report}");

    Ok(TrainOutcome { summary, report })
}

/// Predicts the test table with the stored checkpoint and writes the predictions file.
///
/// # Returns
/// The amount of predictions written.
pub fn predict(config: &Config) -> Result<usize> {
    let checkpoint = Checkpoint::load(&config.output.checkpoint_path)?;
    info!(
        "loaded model from step {} with valid loss {:.5}",
        checkpoint.step, checkpoint.valid_loss
    );

    let table = CovidTable::from_path(&config.data.test_path, false)?;
    let width = table.headers().len();
    if let Some(&c) = checkpoint.features.iter().find(|&&c| c >= width) {
        return Err(ForecastErr::FeatureCountMismatch {
            got: width,
            expected: c + 1,
        });
    }

    let mut x = table.features().select(Axis(1), &checkpoint.features);
    match &checkpoint.standardizer {
        Some(standardizer) => standardizer.transform(x.view_mut())?,
        None => warn!("the checkpoint has no standardizer, feeding raw features"),
    }

    let mut model = checkpoint.model()?;
    let y_pred = model.forward(&checkpoint.params, x.view())?;

    if y_pred.ncols() != 1 {
        return Err(ForecastErr::CheckpointMismatch(format!(
            "the model predicts {} values per row, a single one is expected",
            y_pred.ncols()
        )));
    }

    let path = &config.output.predictions_path;
    let file = File::create(path)?;
    let rows = write_predictions(
        io::BufWriter::new(file),
        table.ids(),
        y_pred.index_axis(Axis(1), 0),
    )?;
    info!("{rows} predictions written to {}", path.display());

    Ok(rows)
}

/// Writes an `id,tested_positive` CSV, one row per id.
pub fn write_predictions<W: io::Write>(
    writer: W,
    ids: &[String],
    predictions: ArrayView1<f32>,
) -> Result<usize> {
    if ids.len() != predictions.len() {
        return Err(ForecastErr::FeatureCountMismatch {
            got: predictions.len(),
            expected: ids.len(),
        });
    }

    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    for (id, &tested_positive) in ids.iter().zip(predictions) {
        csv_writer.serialize(PredictionRow { id, tested_positive })?;
    }
    csv_writer.flush()?;

    Ok(ids.len())
}

/// Grades the loss stored in a checkpoint file.
pub fn grade_checkpoint<P: AsRef<Path>>(path: P) -> Result<Report> {
    let checkpoint = Checkpoint::load(path)?;
    Ok(Report::new(checkpoint.valid_loss))
}
