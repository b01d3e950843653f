use ndarray::{Array2, ArrayView2};

/// Measures how far a model's output is from the expected one.
pub trait LossFn {
    /// Computes the loss of the prediction `y_pred` against the expected output `y`.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;

    /// Computes the derivative of the loss with respect to every element of `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
