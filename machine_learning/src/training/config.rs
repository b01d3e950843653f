use crate::{MlErr, Result};

/// The knobs of a step-based training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerConfig {
    /// The amount of samples per optimizer update.
    pub batch_size: usize,
    /// The amount of optimizer updates to run.
    pub total_steps: usize,
    /// Validate every this many steps. The last step is always validated.
    pub valid_steps: usize,
    /// Hand the best parameters to the save callback every this many steps.
    pub save_steps: Option<usize>,
    /// Stop after this many consecutive validations without improvement.
    pub early_stop: Option<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 270,
            total_steps: 3000,
            valid_steps: 20,
            save_steps: Some(100),
            early_stop: None,
        }
    }
}

impl TrainerConfig {
    /// Checks every count is positive.
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("batch_size", Some(self.batch_size)),
            ("total_steps", Some(self.total_steps)),
            ("valid_steps", Some(self.valid_steps)),
            ("save_steps", self.save_steps),
            ("early_stop", self.early_stop),
        ];

        match counts.into_iter().find(|(_, count)| *count == Some(0)) {
            Some((name, _)) => Err(MlErr::InvalidHyperparameter(format!(
                "{name} must be greater than 0"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(TrainerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        let cfg = TrainerConfig {
            valid_steps: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TrainerConfig {
            early_stop: Some(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
