use ndarray::{Array2, ArrayView2};

use super::{Model, Regularization, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if there are no layers or the output size of a
    /// layer doesn't match the input size of the next one.
    pub fn new<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<_> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::InvalidShape(
                "a sequential model needs at least one layer".into(),
            ));
        }

        for (i, pair) in layers.windows(2).enumerate() {
            let (_, prev_m) = pair[0].dim();
            let (curr_n, _) = pair[1].dim();

            if prev_m != curr_n {
                return Err(MlErr::InvalidShape(format!(
                    "layer {}: input size ({curr_n}) does not match previous layer output size ({prev_m})",
                    i + 1
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The amount of features the model expects per sample.
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dim().0)
    }

    /// The amount of values the model outputs per sample.
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.dim().1)
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// A view of the prediction for the given input or an error if occurred.
    pub fn forward_view<'x>(
        &'x mut self,
        params: &[f32],
        mut x: ArrayView2<'x, f32>,
    ) -> Result<ArrayView2<'x, f32>> {
        self.check_params(params.len())?;

        let mut offset = 0;
        for layer in self.layers.iter_mut() {
            let size = layer.size();
            x = layer.forward(&params[offset..offset + size], x)?;
            offset += size;
        }

        Ok(x)
    }

    /// Sums the regularization penalty of every layer.
    pub fn penalty(&self, params: &[f32], reg: &Regularization) -> Result<f32> {
        self.check_params(params.len())?;

        let mut offset = 0;
        let mut total = 0.;
        for layer in &self.layers {
            let size = layer.size();
            total += layer.penalty(&params[offset..offset + size], reg)?;
            offset += size;
        }

        Ok(total)
    }

    fn check_params(&self, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.forward_view(params, x).map(|y| y.to_owned())
    }

    // NOTE: the returned loss is the average of the batch losses, each computed before its own
    // update, not the loss of the final parameters over every batch.
    fn backprop<'a, O, L, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        optimizer: &mut O,
        loss_fn: &L,
        reg: &Regularization,
        batches: I,
    ) -> Result<f32>
    where
        O: Optimizer + ?Sized,
        L: LossFn,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        self.check_params(grad.len())?;

        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            grad.fill(0.0);

            let (loss, mut d_last) = {
                let y_pred = self.forward_view(params, x)?;

                if y_pred.dim() != y.dim() {
                    return Err(MlErr::InvalidShape(format!(
                        "prediction has shape {:?} but the targets have shape {:?}",
                        y_pred.dim(),
                        y.dim()
                    )));
                }

                (
                    loss_fn.loss(y_pred.view(), y.view()),
                    loss_fn.loss_prime(y_pred, y.view()),
                )
            };

            total_loss += loss + self.penalty(params, reg)?;
            num_batches += 1;

            let mut d = d_last.view_mut();
            let mut end = grad.len();

            for layer in self.layers.iter_mut().rev() {
                let start = end - layer.size();
                d = layer.backward(&params[start..end], &mut grad[start..end], d, reg)?;
                end = start;
            }

            optimizer.update_params(grad, params)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{activations::ActFn, loss::Mse},
        optimization::GradientDescent,
    };

    fn model() -> Sequential {
        Sequential::new([
            Layer::dense((2, 3), Some(ActFn::sigmoid(1.))),
            Layer::dense((3, 1), None),
        ])
        .unwrap()
    }

    #[test]
    fn mismatched_layers_are_rejected() {
        let layers = [Layer::dense((2, 3), None), Layer::dense((2, 1), None)];
        assert!(Sequential::new(layers).is_err());
        assert!(Sequential::new(Vec::<Layer>::new()).is_err());
    }

    #[test]
    fn size_adds_up_layers() {
        let model = model();
        assert_eq!(model.size(), 3 * 3 + 4);
        assert_eq!(model.input_size(), 2);
        assert_eq!(model.output_size(), 1);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut model = model();
        let params: Vec<f32> = (0..model.size())
            .map(|i| ((i as f32) * 0.37).sin() * 0.5)
            .collect();

        let x = array![[0.5, -1.0], [1.5, 0.25], [-0.75, 2.0]];
        let y = array![[1.0], [-0.5], [0.25]];
        let reg = Regularization::L2 { lambda: 0.01 };

        // A zero learning rate leaves the parameters as they are after the pass.
        let mut optimizer = GradientDescent::new(0.0);
        let mut grad = vec![0.0; model.size()];
        let mut analytic = params.clone();
        model
            .backprop(
                &mut analytic,
                &mut grad,
                &mut optimizer,
                &Mse,
                &reg,
                std::iter::once((x.view(), y.view())),
            )
            .unwrap();

        let mut loss_at = |p: &[f32]| {
            let y_pred = model.forward(p, x.view()).unwrap();
            Mse.loss(y_pred.view(), y.view()) + model.penalty(p, &reg).unwrap()
        };

        let eps = 1e-2;
        for i in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[i] += eps;
            minus[i] -= eps;

            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
            assert!(
                (numeric - grad[i]).abs() < 1e-2,
                "param {i}: numeric {numeric}, analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn backprop_reduces_loss_on_linear_data() {
        let mut model = Sequential::new([Layer::dense((1, 1), None)]).unwrap();
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = x.mapv(|x| 2.0 * x + 1.0);

        let mut params = vec![0.0; model.size()];
        let mut grad = vec![0.0; model.size()];
        let mut optimizer = GradientDescent::new(0.1);

        let batches = (0..500).map(|_| (x.view(), y.view()));
        model
            .backprop(
                &mut params,
                &mut grad,
                &mut optimizer,
                &Mse,
                &Regularization::None,
                batches,
            )
            .unwrap();

        assert!((params[0] - 2.0).abs() < 1e-2, "w = {}", params[0]);
        assert!((params[1] - 1.0).abs() < 1e-2, "b = {}", params[1]);
    }

    #[test]
    fn mismatched_targets_fail() {
        let mut model = model();
        let mut params = vec![0.0; model.size()];
        let mut grad = vec![0.0; model.size()];
        let x = array![[0.0, 1.0]];
        let y = array![[0.0, 1.0]];

        let result = model.backprop(
            &mut params,
            &mut grad,
            &mut GradientDescent::new(0.1),
            &Mse,
            &Regularization::None,
            std::iter::once((x.view(), y.view())),
        );

        assert!(result.is_err());
    }
}
