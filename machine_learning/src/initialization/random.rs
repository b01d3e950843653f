use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::{MlErr, Result};

/// A parameter generator that follows a certain probabilistic distribution.
///
/// The random number generator is shared so that several generators chained together still
/// produce a reproducible sequence out of a single seed.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Samples uniformly from `[low, high)`.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high or not finite).
    pub fn uniform(rng: Rc<RefCell<R>>, limit: usize, low: f32, high: f32) -> Result<Self> {
        let distribution = Uniform::new(low, high)
            .map_err(|e| MlErr::InvalidHyperparameter(format!("uniform({low}, {high}): {e}")))?;

        Ok(Self::new(rng, distribution, limit))
    }

    /// Xavier (Glorot) uniform initialization, `U(-r, r)` with `r = sqrt(6 / (fan_in + fan_out))`.
    pub fn xavier_uniform(
        rng: Rc<RefCell<R>>,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }

    /// LeCun uniform initialization, `U(-r, r)` with `r = sqrt(3 / fan_in)`.
    pub fn lecun_uniform(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let range = (3. / fan_in.max(1) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Samples from `N(mean, std_dev^2)`.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (NaN or infinite).
    pub fn normal(rng: Rc<RefCell<R>>, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        let distribution = Normal::new(mean, std_dev).map_err(|e| {
            MlErr::InvalidHyperparameter(format!("normal({mean}, {std_dev}): {e}"))
        })?;

        Ok(Self::new(rng, distribution, limit))
    }

    /// Kaiming (He) normal initialization, `N(0, 2 / fan_in)`.
    pub fn kaiming(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }

    /// Xavier (Glorot) normal initialization, `N(0, 2 / (fan_in + fan_out))`.
    pub fn xavier(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize, fan_out: usize) -> Result<Self> {
        Self::kaiming(rng, limit, fan_in + fan_out)
    }

    /// LeCun normal initialization, `N(0, 1 / fan_in)`.
    pub fn lecun(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (1. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let mut rng = self.rng.borrow_mut();
        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut *rng))
            .collect();

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn respects_the_limit() {
        let mut param_gen = RandParamGen::normal(seeded_rng(), 10, 0., 1.).unwrap();

        assert_eq!(param_gen.sample(7).unwrap().len(), 7);
        assert_eq!(param_gen.sample(7).unwrap().len(), 3);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn xavier_uniform_stays_in_range() {
        let mut param_gen = RandParamGen::xavier_uniform(seeded_rng(), 1000, 4, 2).unwrap();
        let range = 1.0f32;

        let sample = param_gen.sample(1000).unwrap();
        assert!(sample.iter().all(|w| (-range..range).contains(w)));
    }

    #[test]
    fn same_seed_same_parameters() {
        let a = RandParamGen::kaiming(seeded_rng(), 5, 3)
            .unwrap()
            .sample(5)
            .unwrap();
        let b = RandParamGen::kaiming(seeded_rng(), 5, 3)
            .unwrap()
            .sample(5)
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn invalid_distributions_fail() {
        assert!(RandParamGen::uniform(seeded_rng(), 1, 1., 0.).is_err());
        assert!(RandParamGen::normal(seeded_rng(), 1, 0., f32::NAN).is_err());
    }
}
