use std::{cell::RefCell, rc::Rc};

use rand::Rng;

use super::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen};
use crate::{MlErr, Result};

/// The initialization scheme for the weights of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Xavier,
    Kaiming,
    Lecun,
    LecunUniform,
}

impl Init {
    /// Builds the generator for the `limit` weights of a layer with `fan_in` inputs and
    /// `fan_out` outputs.
    pub fn param_gen<R: Rng + 'static>(
        self,
        rng: &Rc<RefCell<R>>,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Box<dyn ParamGen>> {
        let rng = Rc::clone(rng);

        let param_gen: Box<dyn ParamGen> = match self {
            Self::Const { value } => Box::new(ConstParamGen::new(value, limit)),
            Self::Uniform { low, high } => Box::new(RandParamGen::uniform(rng, limit, low, high)?),
            Self::Normal { mean, std_dev } => {
                Box::new(RandParamGen::normal(rng, limit, mean, std_dev)?)
            }
            Self::XavierUniform => {
                Box::new(RandParamGen::xavier_uniform(rng, limit, fan_in, fan_out)?)
            }
            Self::Xavier => Box::new(RandParamGen::xavier(rng, limit, fan_in, fan_out)?),
            Self::Kaiming => Box::new(RandParamGen::kaiming(rng, limit, fan_in)?),
            Self::Lecun => Box::new(RandParamGen::lecun(rng, limit, fan_in)?),
            Self::LecunUniform => Box::new(RandParamGen::lecun_uniform(rng, limit, fan_in)?),
        };

        Ok(param_gen)
    }
}

/// Samples the initial parameters of a stack of dense layers with dimensions `dims`.
///
/// Weights follow `init`, biases start at zero, in the same layout the layers expect.
pub fn init_dense_params<R: Rng + 'static>(
    init: Init,
    dims: &[(usize, usize)],
    rng: &Rc<RefCell<R>>,
) -> Result<Vec<f32>> {
    let mut param_gens = Vec::with_capacity(dims.len() * 2);

    for &(n, m) in dims {
        param_gens.push(init.param_gen(rng, n * m, n, m)?);
        param_gens.push(Box::new(ConstParamGen::zeros(m)) as Box<dyn ParamGen>);
    }

    let size = dims.iter().map(|(n, m)| (n + 1) * m).sum();
    ChainedParamGen::new(param_gens)
        .sample_exact(size)
        .ok_or(MlErr::SizeMismatch {
            what: "initial parameters",
            got: 0,
            expected: size,
        })
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn biases_start_at_zero() {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(7)));
        let params = init_dense_params(Init::Kaiming, &[(2, 3), (3, 1)], &rng).unwrap();

        assert_eq!(params.len(), 9 + 4);
        assert_eq!(&params[6..9], &[0., 0., 0.]);
        assert_eq!(params[12], 0.);
        assert!(params[..6].iter().any(|&w| w != 0.));
    }

    #[test]
    fn constant_weights() {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(7)));
        let params = init_dense_params(Init::Const { value: 0.5 }, &[(1, 2)], &rng).unwrap();

        assert_eq!(params, [0.5, 0.5, 0., 0.]);
    }
}
