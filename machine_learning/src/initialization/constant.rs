use super::ParamGen;

/// Yields a single value up to a limit, e.g. zeroed biases.
#[derive(Debug, Clone)]
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` yielding `value` at most `limit` times.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }

    /// Yields `limit` zeros.
    pub fn zeros(limit: usize) -> Self {
        Self::new(0., limit)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let taken = n.min(self.remaining);
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= taken;
        Some(vec![self.value; taken])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_the_limit() {
        let mut param_gen = ConstParamGen::new(1., 10);

        assert_eq!(param_gen.sample(7).unwrap(), [1.; 7]);
        assert_eq!(param_gen.sample(7).unwrap(), [1.; 3]);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn zeros_for_biases() {
        let mut param_gen = ConstParamGen::zeros(4);

        assert_eq!(param_gen.sample_exact(4).unwrap(), [0.; 4]);
        assert!(ConstParamGen::zeros(0).sample(1).is_none());
    }

    #[test]
    fn exact_sampling_rejects_short_samples() {
        let mut param_gen = ConstParamGen::new(0., 2);
        assert!(param_gen.sample_exact(3).is_none());
    }
}
