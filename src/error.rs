use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The forecast crate's result type.
pub type Result<T> = std::result::Result<T, ForecastErr>;

/// All errors that can occur while loading data, training or predicting.
#[derive(Debug)]
pub enum ForecastErr {
    Io(io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Ml(MlErr),
    /// A cell that isn't a number, `row` being the 1-based data row.
    InvalidCell {
        row: usize,
        column: String,
        value: String,
    },
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
    EmptyTable,
    /// The table has no room for features after the id (and target) columns.
    TooFewColumns {
        got: usize,
        needed: usize,
    },
    InvalidConfig(String),
    InvalidFeature(String),
    FeatureCountMismatch {
        got: usize,
        expected: usize,
    },
    CheckpointMismatch(String),
}

impl fmt::Display for ForecastErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::InvalidCell { row, column, value } => {
                write!(f, "row {row}, column {column}: {value:?} is not a number")
            }
            Self::RaggedRow { row, got, expected } => {
                write!(f, "row {row} has {got} fields, expected {expected}")
            }
            Self::EmptyTable => write!(f, "the table has no data rows"),
            Self::TooFewColumns { got, needed } => {
                write!(f, "the table has {got} columns, at least {needed} are needed")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::InvalidFeature(msg) => write!(f, "invalid feature selection: {msg}"),
            Self::FeatureCountMismatch { got, expected } => {
                write!(f, "got {got} features, the model expects {expected}")
            }
            Self::CheckpointMismatch(msg) => write!(f, "checkpoint mismatch: {msg}"),
        }
    }
}

impl Error for ForecastErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ForecastErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ForecastErr {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<serde_json::Error> for ForecastErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for ForecastErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for callbacks that report failures as I/O errors.
impl From<ForecastErr> for io::Error {
    fn from(value: ForecastErr) -> Self {
        match value {
            ForecastErr::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
