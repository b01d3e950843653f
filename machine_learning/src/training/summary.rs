/// The parameters of the model at a given point of training.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub params: Vec<f32>,
    pub step: usize,
    pub valid_loss: f32,
}

/// The losses observed at a validation point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRecord {
    pub step: usize,
    /// The mean batch loss since the previous validation.
    pub train_loss: f32,
    pub valid_loss: f32,
}

/// The outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    /// The parameters with the lowest validation loss.
    pub best: Snapshot,
    pub steps_run: usize,
    pub history: Vec<ValidRecord>,
    pub stopped_early: bool,
}
