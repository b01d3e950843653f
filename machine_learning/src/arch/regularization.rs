use crate::{MlErr, Result};

/// A penalty on the magnitude of the weights, added to the data loss.
///
/// It is applied to weights only, biases are never penalized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Regularization {
    #[default]
    None,
    /// Lasso, `lambda * sum(|w|)`.
    L1 { lambda: f32 },
    /// Ridge, `lambda * sum(w^2)`.
    L2 { lambda: f32 },
    /// Both penalties at once.
    ElasticNet { l1: f32, l2: f32 },
}

impl Regularization {
    /// Checks that every coefficient is finite and non negative.
    pub fn validate(&self) -> Result<()> {
        let coefficients = match *self {
            Self::None => [0., 0.],
            Self::L1 { lambda } | Self::L2 { lambda } => [lambda, 0.],
            Self::ElasticNet { l1, l2 } => [l1, l2],
        };

        match coefficients.into_iter().find(|c| !c.is_finite() || *c < 0.) {
            Some(c) => Err(MlErr::InvalidHyperparameter(format!(
                "regularization coefficient must be finite and non negative, got {c}"
            ))),
            None => Ok(()),
        }
    }

    /// The penalty contributed by a single weight.
    pub fn f(&self, w: f32) -> f32 {
        match *self {
            Self::None => 0.,
            Self::L1 { lambda } => lambda * w.abs(),
            Self::L2 { lambda } => lambda * w * w,
            Self::ElasticNet { l1, l2 } => l1 * w.abs() + l2 * w * w,
        }
    }

    /// The derivative of the penalty with respect to a single weight.
    pub fn df(&self, w: f32) -> f32 {
        match *self {
            Self::None => 0.,
            Self::L1 { lambda } => lambda * sign(w),
            Self::L2 { lambda } => 2. * lambda * w,
            Self::ElasticNet { l1, l2 } => l1 * sign(w) + 2. * l2 * w,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// `f32::signum` maps 0 to 1, the subgradient of |w| at 0 is taken as 0 instead.
fn sign(w: f32) -> f32 {
    if w > 0. {
        1.
    } else if w < 0. {
        -1.
    } else {
        0.
    }
}
