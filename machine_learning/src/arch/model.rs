use ndarray::{Array2, ArrayView2};

use crate::{
    arch::{Regularization, loss::LossFn},
    error::Result,
    optimization::Optimizer,
};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Computes the model's output for the batch `x`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one sample per row.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the provided batches. **`params` gets updated** for each batch according to the
    /// optimization algorithm.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient on each batch pass.
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `loss_fn` - The loss function.
    /// * `reg` - The penalty on the weights added to the loss.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The mean loss over the batches, regularization penalty included.
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
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>;
}
