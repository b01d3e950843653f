use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};

use crate::{
    MlErr, Result,
    arch::{Regularization, activations::ActFn},
};

/// A fully connected layer, `a = act(x · W + b)`.
///
/// The layer does not own its parameters, they are given as a slice on each pass laid out as
/// the `n * m` row-major weights followed by the `m` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - The activation function, `None` for a linear output.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            d: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of inputs and outputs of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes the output of the layer for a batch `x` of shape `(batch, n)`.
    ///
    /// The input and the weighted sums are cached for the following `backward` call.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer inputs",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = Self::view_params(self.dim, params)?;
        let shape = (x.nrows(), self.dim.1);

        reshape(&mut self.z, shape);
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        self.x = x.to_owned();

        let Some(act_fn) = &self.act_fn else {
            return Ok(self.z.view());
        };

        reshape(&mut self.a, shape);
        self.a.zip_mut_with(&self.z, |a, &z| *a = act_fn.f(z));
        Ok(self.a.view())
    }

    /// Propagates the delta `d` of this layer's output back to its input.
    ///
    /// Writes the weight and bias gradients (plus the regularization term on the weights) into
    /// `grad`, which must follow the same layout as `params`.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: ArrayViewMut2<f32>,
        reg: &Regularization,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::InvalidShape(format!(
                "dense layer delta has shape {:?}, expected {:?}",
                d.dim(),
                self.z.dim()
            )));
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (w, _) = Self::view_params(self.dim, params)?;
        let (mut dw, mut db) = Self::view_grad(self.dim, grad)?;

        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        if !reg.is_none() {
            dw.zip_mut_with(&w, |g, &w| *g += reg.df(w));
        }

        reshape(&mut self.d, (d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut self.d);

        Ok(self.d.view_mut())
    }

    /// Computes the regularization penalty of this layer's weights.
    pub fn penalty(&self, params: &[f32], reg: &Regularization) -> Result<f32> {
        if reg.is_none() {
            return Ok(0.);
        }

        let (w, _) = Self::view_params(self.dim, params)?;
        Ok(w.iter().map(|&w| reg.f(w)).sum())
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `dim` - The dimensions of the layer.
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params(
        dim: (usize, usize),
        params: &[f32],
    ) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
        let w_size = check_len(dim, params.len(), "dense layer parameters")?;
        let (w_raw, b_raw) = params.split_at(w_size);
        let w = ArrayView2::from_shape(dim, w_raw)?;
        Ok((w, ArrayView1::from(b_raw)))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `dim` - The dimensions of the layer.
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad(
        dim: (usize, usize),
        grad: &mut [f32],
    ) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
        let w_size = check_len(dim, grad.len(), "dense layer gradient")?;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(dim, dw_raw)?;
        Ok((dw, ArrayViewMut1::from(db_raw)))
    }
}

/// Returns the amount of weights if `len` matches the size of a layer with dimensions `dim`.
fn check_len(dim: (usize, usize), len: usize, what: &'static str) -> Result<usize> {
    let w_size = dim.0 * dim.1;
    let expected = w_size + dim.1;

    if len != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got: len,
            expected,
        });
    }

    Ok(w_size)
}

/// Reallocates `buf` only when the batch shape changed.
fn reshape(buf: &mut Array2<f32>, shape: (usize, usize)) {
    if buf.dim() != shape {
        *buf = Array2::zeros(shape);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_is_affine_without_activation() {
        // w = [[1, 2], [3, 4]], b = [0.5, -1]
        let params = [1., 2., 3., 4., 0.5, -1.];
        let mut dense = Dense::new((2, 2), None);

        let x = array![[1., 1.], [0., 2.]];
        let out = dense.forward(&params, x.view()).unwrap();

        assert_eq!(out, array![[4.5, 5.], [6.5, 7.]]);
    }

    #[test]
    fn forward_applies_activation() {
        let params = [-1., 2., 0., 0.];
        let mut dense = Dense::new((1, 2), Some(ActFn::relu()));

        let x = array![[3.]];
        let out = dense.forward(&params, x.view()).unwrap();

        assert_eq!(out, array![[0., 6.]]);
    }

    #[test]
    fn backward_writes_weight_and_bias_gradients() {
        let params = [2., 1.];
        let mut grad = [0.; 2];
        let mut dense = Dense::new((1, 1), None);

        let x = array![[1.], [3.]];
        dense.forward(&params, x.view()).unwrap();

        let mut d = array![[1.], [2.]];
        let d_prev = dense
            .backward(&params, &mut grad, d.view_mut(), &Regularization::None)
            .unwrap();

        assert_eq!(d_prev, array![[2.], [4.]]);
        assert_eq!(grad, [7., 3.]);
    }

    #[test]
    fn regularization_only_touches_weights() {
        let params = [2., 1.];
        let mut grad = [0.; 2];
        let mut dense = Dense::new((1, 1), None);
        let reg = Regularization::L2 { lambda: 0.5 };

        let x = array![[0.]];
        dense.forward(&params, x.view()).unwrap();

        let mut d = array![[0.]];
        dense.backward(&params, &mut grad, d.view_mut(), &reg).unwrap();

        assert_eq!(grad, [2., 0.]);
        assert_eq!(dense.penalty(&params, &reg).unwrap(), 2.);
    }

    #[test]
    fn wrong_parameter_count_fails() {
        let mut dense = Dense::new((2, 1), None);
        let x = array![[1., 1.]];

        assert!(dense.forward(&[1., 2.], x.view()).is_err());
    }

    #[test]
    fn wrong_input_width_fails() {
        let mut dense = Dense::new((2, 1), None);
        let x = array![[1., 1., 1.]];

        assert!(dense.forward(&[1., 2., 3.], x.view()).is_err());
    }
}
