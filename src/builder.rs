use std::{cell::RefCell, rc::Rc};

use machine_learning::{
    arch::{Sequential, layers::Layer},
    initialization::init_dense_params,
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    config::{ActivationConfig, InitConfig, OptimizerConfig},
};

/// Builds the runtime pieces of a training run out of their configuration.
#[derive(Default)]
pub struct ForecastBuilder;

impl ForecastBuilder {
    /// Creates a new `ForecastBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// The dimensions of every dense layer of a regressor with `input` features, the given
    /// `hidden` layer sizes and a single output.
    pub fn layer_dims(&self, input: usize, hidden: &[usize]) -> Vec<(usize, usize)> {
        let sizes: Vec<usize> = [input]
            .into_iter()
            .chain(hidden.iter().copied())
            .chain([1])
            .collect();

        sizes.windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// Builds a `Sequential` of dense layers, every one but the last followed by `activation`.
    pub fn build_model(
        &self,
        dims: &[(usize, usize)],
        activation: ActivationConfig,
    ) -> Result<Sequential> {
        let last = dims.len().saturating_sub(1);
        let layers = dims.iter().enumerate().map(|(i, &dim)| {
            let act_fn = (i < last).then(|| activation.act_fn());
            Layer::dense(dim, act_fn)
        });

        Ok(Sequential::new(layers)?)
    }

    /// Samples the initial parameters for layers of dimensions `dims`.
    pub fn init_params(
        &self,
        dims: &[(usize, usize)],
        init: InitConfig,
        rng: &Rc<RefCell<StdRng>>,
    ) -> Result<Vec<f32>> {
        Ok(init_dense_params(init.into(), dims, rng)?)
    }

    /// Builds the optimizer for a model of `size` parameters.
    pub fn build_optimizer(&self, cfg: OptimizerConfig, size: usize) -> Box<dyn Optimizer> {
        match cfg {
            OptimizerConfig::Sgd { learning_rate } => Box::new(GradientDescent::new(learning_rate)),
            OptimizerConfig::Momentum {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(
                size,
                learning_rate,
                momentum,
            )),
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Box::new(
                Adam::new(size, learning_rate, beta1, beta2, epsilon)
                    .with_weight_decay(weight_decay),
            ),
        }
    }

    pub fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
