mod config;
mod summary;
mod trainer;

pub use config::TrainerConfig;
pub use summary::{Snapshot, TrainSummary, ValidRecord};
pub use trainer::{Trainer, evaluate};
