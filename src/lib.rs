pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;

pub use error::{ForecastErr, Result};
