use ndarray::{ArrayView2, ArrayViewMut2};

use super::Dense;
use crate::{
    Result,
    arch::{Regularization, activations::ActFn},
};

/// A layer of a `Sequential` model.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        match self {
            Self::Dense(l) => l.dim(),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayViewMut2<f32>,
        reg: &Regularization,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d, reg),
        }
    }

    pub fn penalty(&self, params: &[f32], reg: &Regularization) -> Result<f32> {
        match self {
            Self::Dense(l) => l.penalty(params, reg),
        }
    }
}
