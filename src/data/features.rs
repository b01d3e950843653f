use serde::{Deserialize, Serialize};

use crate::{ForecastErr, Result};

/// The amount of one-hot state columns leading the feature columns.
pub const STATE_COLUMNS: usize = 40;

/// The prefix shared by the daily positive rate columns.
pub const POSITIVE_PREFIX: &str = "tested_positive";

/// Which feature columns the model is fed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    #[default]
    All,
    /// Explicit feature column indices, the id column excluded.
    Columns(Vec<usize>),
    /// The one-hot states plus the positive rate of the previous days.
    StatesAndPositive,
}

impl FeatureSelection {
    /// Resolves the selection into feature column indices against the table `headers`.
    pub fn resolve(&self, headers: &[String]) -> Result<Vec<usize>> {
        let columns: Vec<usize> = match self {
            Self::All => (0..headers.len()).collect(),
            Self::Columns(columns) => {
                if let Some(&c) = columns.iter().find(|&&c| c >= headers.len()) {
                    return Err(ForecastErr::InvalidFeature(format!(
                        "column {c} is out of range, the table has {} features",
                        headers.len()
                    )));
                }

                let mut seen = vec![false; headers.len()];
                for &c in columns {
                    if std::mem::replace(&mut seen[c], true) {
                        return Err(ForecastErr::InvalidFeature(format!(
                            "column {c} is selected twice"
                        )));
                    }
                }

                columns.clone()
            }
            Self::StatesAndPositive => {
                if headers.len() < STATE_COLUMNS {
                    return Err(ForecastErr::InvalidFeature(format!(
                        "expected {STATE_COLUMNS} state columns, the table has {} features",
                        headers.len()
                    )));
                }

                let positive = headers
                    .iter()
                    .enumerate()
                    .skip(STATE_COLUMNS)
                    .filter(|(_, h)| h.starts_with(POSITIVE_PREFIX))
                    .map(|(i, _)| i);

                (0..STATE_COLUMNS).chain(positive).collect()
            }
        };

        if columns.is_empty() {
            return Err(ForecastErr::InvalidFeature("no feature selected".into()));
        }

        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        let states = (0..STATE_COLUMNS).map(|i| format!("state{i}"));
        let days = (1..=2).flat_map(|d| [format!("cli.{d}"), format!("tested_positive.{d}")]);
        states.chain(["cli".to_string(), "tested_positive".to_string()]).chain(days).collect()
    }

    #[test]
    fn all_selects_every_column() {
        let headers = headers();
        let columns = FeatureSelection::All.resolve(&headers).unwrap();
        assert_eq!(columns, (0..headers.len()).collect::<Vec<_>>());
    }

    #[test]
    fn states_and_positive_keeps_positive_rates() {
        let columns = FeatureSelection::StatesAndPositive
            .resolve(&headers())
            .unwrap();

        assert_eq!(columns.len(), STATE_COLUMNS + 3);
        assert_eq!(&columns[STATE_COLUMNS..], [41, 43, 45]);
    }

    #[test]
    fn explicit_columns_are_checked() {
        let headers = headers();

        let columns = FeatureSelection::Columns(vec![41, 0]).resolve(&headers).unwrap();
        assert_eq!(columns, [41, 0]);

        assert!(FeatureSelection::Columns(vec![99]).resolve(&headers).is_err());
        assert!(FeatureSelection::Columns(vec![1, 1]).resolve(&headers).is_err());
        assert!(FeatureSelection::Columns(vec![]).resolve(&headers).is_err());
    }

    #[test]
    fn states_need_enough_columns() {
        let headers = vec!["cli".to_string()];
        assert!(FeatureSelection::StatesAndPositive.resolve(&headers).is_err());
    }
}
