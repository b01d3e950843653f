/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Samples exactly `n` parameters.
    ///
    /// # Returns
    /// `None` if the generator can't provide `n` values.
    fn sample_exact(&mut self, n: usize) -> Option<Vec<f32>> {
        let sample = self.sample(n)?;
        (sample.len() == n).then_some(sample)
    }
}
