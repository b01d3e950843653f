use std::fmt;

/// The validation loss reported for the submitted model.
pub const REPORTED_VALID_LOSS: f32 = 0.8051;

/// The test loss reported for the submitted model.
pub const REPORTED_TEST_LOSS: f32 = 0.95505;

/// The loss to beat for the medium grade.
pub const MEDIUM_BASELINE: f32 = 1.36937;

/// The loss to beat for the strong grade.
pub const STRONG_BASELINE: f32 = 0.89266;

/// The grade of a mean squared error against the baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Strong,
    Medium,
    BelowMedium,
}

impl Grade {
    /// Grades `loss`, a baseline counts as passed only when the loss is strictly below it.
    pub fn for_loss(loss: f32) -> Self {
        if loss < STRONG_BASELINE {
            Self::Strong
        } else if loss < MEDIUM_BASELINE {
            Self::Medium
        } else {
            Self::BelowMedium
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "strong baseline passed"),
            Self::Medium => write!(f, "medium baseline passed, strong baseline not reached"),
            Self::BelowMedium => write!(f, "medium baseline not reached"),
        }
    }
}

/// A loss together with its grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub loss: f32,
    pub grade: Grade,
}

impl Report {
    pub fn new(loss: f32) -> Self {
        Self {
            loss,
            grade: Grade::for_loss(loss),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mse {:.5}: {} (medium {MEDIUM_BASELINE}, strong {STRONG_BASELINE})",
            self.loss, self.grade
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_losses() {
        assert_eq!(Grade::for_loss(REPORTED_TEST_LOSS), Grade::Medium);
        assert_eq!(Grade::for_loss(REPORTED_VALID_LOSS), Grade::Strong);
    }

    #[test]
    fn baselines_must_be_beaten_strictly() {
        assert_eq!(Grade::for_loss(STRONG_BASELINE), Grade::Medium);
        assert_eq!(Grade::for_loss(MEDIUM_BASELINE), Grade::BelowMedium);
        assert_eq!(Grade::for_loss(f32::NAN), Grade::BelowMedium);
    }

    #[test]
    fn report_display() {
        let report = Report::new(REPORTED_TEST_LOSS);
        assert_eq!(
            report.to_string(),
            "mse 0.95505: medium baseline passed, strong baseline not reached (medium 1.36937, strong 0.89266)"
        );
    }
}
