use std::{
    fs,
    path::{Path, PathBuf},
};

use machine_learning::{
    arch::{Regularization, activations::ActFn},
    initialization::Init,
    optimization::LrSchedule,
    training::TrainerConfig,
};
use serde::{Deserialize, Serialize};

use crate::{ForecastErr, Result, data::FeatureSelection};

/// The whole configuration of a training and inference run, read from JSON.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
    pub regularization: RegularizationConfig,
    pub schedule: ScheduleConfig,
    pub training: TrainingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub features: FeatureSelection,
    /// Standardize the non one-hot features with training set statistics.
    pub normalize: bool,
    /// Row `i` is held out for validation when `i % valid_fold == 0`.
    pub valid_fold: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: "covid.train.csv".into(),
            test_path: "covid.test.csv".into(),
            features: FeatureSelection::All,
            normalize: true,
            valid_fold: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// The output size of every hidden layer, the output layer is always a single linear unit.
    pub hidden: Vec<usize>,
    pub activation: ActivationConfig,
    pub init: InitConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden: vec![16, 8],
            activation: ActivationConfig::Relu,
            init: InitConfig::Kaiming,
        }
    }
}

/// The activation of the hidden layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ActivationConfig {
    Sigmoid {
        #[serde(default = "default_amp")]
        amp: f32,
    },
    Relu,
    LeakyRelu {
        #[serde(default = "default_slope")]
        slope: f32,
    },
}

impl ActivationConfig {
    pub fn act_fn(self) -> ActFn {
        match self {
            Self::Sigmoid { amp } => ActFn::sigmoid(amp),
            Self::Relu => ActFn::relu(),
            Self::LeakyRelu { slope } => ActFn::leaky_relu(slope),
        }
    }
}

/// The initialization of the weights, biases always start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum InitConfig {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Xavier,
    Kaiming,
    Lecun,
    LecunUniform,
}

impl From<InitConfig> for Init {
    fn from(value: InitConfig) -> Self {
        match value {
            InitConfig::Const { value } => Init::Const { value },
            InitConfig::Uniform { low, high } => Init::Uniform { low, high },
            InitConfig::Normal { mean, std_dev } => Init::Normal { mean, std_dev },
            InitConfig::XavierUniform => Init::XavierUniform,
            InitConfig::Xavier => Init::Xavier,
            InitConfig::Kaiming => Init::Kaiming,
            InitConfig::Lecun => Init::Lecun,
            InitConfig::LecunUniform => Init::LecunUniform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f32,
    },
    Momentum {
        learning_rate: f32,
        #[serde(default = "default_momentum")]
        momentum: f32,
    },
    Adam {
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
        #[serde(default)]
        weight_decay: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            learning_rate: 1e-3,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            Self::Sgd { learning_rate }
            | Self::Momentum { learning_rate, .. }
            | Self::Adam { learning_rate, .. } => learning_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum RegularizationConfig {
    #[default]
    None,
    L1 {
        lambda: f32,
    },
    L2 {
        lambda: f32,
    },
    ElasticNet {
        l1: f32,
        l2: f32,
    },
}

impl From<RegularizationConfig> for Regularization {
    fn from(value: RegularizationConfig) -> Self {
        match value {
            RegularizationConfig::None => Regularization::None,
            RegularizationConfig::L1 { lambda } => Regularization::L1 { lambda },
            RegularizationConfig::L2 { lambda } => Regularization::L2 { lambda },
            RegularizationConfig::ElasticNet { l1, l2 } => Regularization::ElasticNet { l1, l2 },
        }
    }
}

/// The learning rate schedule, the decay always ends at `training.total_steps`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ScheduleConfig {
    #[default]
    Constant,
    CosineWarmup {
        warmup_steps: usize,
        #[serde(default = "default_cycles")]
        cycles: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub total_steps: usize,
    pub valid_steps: usize,
    pub save_steps: Option<usize>,
    pub early_stop: Option<usize>,
    /// Seeds both the initialization and the shuffling, `None` draws a seed from the OS.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let TrainerConfig {
            batch_size,
            total_steps,
            valid_steps,
            save_steps,
            early_stop,
        } = TrainerConfig::default();

        Self {
            batch_size,
            total_steps,
            valid_steps,
            save_steps,
            early_stop,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub checkpoint_path: PathBuf,
    pub predictions_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: "model.ckpt.json".into(),
            predictions_path: "pred.csv".into(),
        }
    }
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if self.data.valid_fold < 2 {
            return Err(ForecastErr::InvalidConfig(format!(
                "valid_fold must be at least 2, got {}",
                self.data.valid_fold
            )));
        }

        if let Some(i) = self.model.hidden.iter().position(|&h| h == 0) {
            return Err(ForecastErr::InvalidConfig(format!(
                "hidden layer {i} has no units"
            )));
        }

        match self.model.activation {
            ActivationConfig::Sigmoid { amp } if !(amp.is_finite() && amp > 0.0) => {
                return Err(ForecastErr::InvalidConfig(format!(
                    "sigmoid amplitude must be positive, got {amp}"
                )));
            }
            ActivationConfig::LeakyRelu { slope } if !slope.is_finite() => {
                return Err(ForecastErr::InvalidConfig(format!(
                    "leaky relu slope must be finite, got {slope}"
                )));
            }
            _ => {}
        }

        self.validate_optimizer()?;

        Regularization::from(self.regularization)
            .validate()
            .map_err(|e| ForecastErr::InvalidConfig(e.to_string()))?;

        if let ScheduleConfig::CosineWarmup { cycles, .. } = self.schedule {
            if !(cycles.is_finite() && cycles > 0.0) {
                return Err(ForecastErr::InvalidConfig(format!(
                    "schedule cycles must be positive, got {cycles}"
                )));
            }
        }

        self.trainer_config()
            .validate()
            .map_err(|e| ForecastErr::InvalidConfig(e.to_string()))
    }

    fn validate_optimizer(&self) -> Result<()> {
        let lr = self.optimizer.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(ForecastErr::InvalidConfig(format!(
                "learning rate must be positive, got {lr}"
            )));
        }

        match self.optimizer {
            OptimizerConfig::Sgd { .. } => Ok(()),
            OptimizerConfig::Momentum { momentum, .. } => {
                if !(0.0..1.0).contains(&momentum) {
                    return Err(ForecastErr::InvalidConfig(format!(
                        "momentum must be in [0, 1), got {momentum}"
                    )));
                }
                Ok(())
            }
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                weight_decay,
                ..
            } => {
                if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
                    return Err(ForecastErr::InvalidConfig(format!(
                        "adam betas must be in [0, 1), got {beta1} and {beta2}"
                    )));
                }

                if !(epsilon > 0.0 && weight_decay >= 0.0) {
                    return Err(ForecastErr::InvalidConfig(format!(
                        "adam needs a positive epsilon and a non negative weight decay, got {epsilon} and {weight_decay}"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            batch_size: self.training.batch_size,
            total_steps: self.training.total_steps,
            valid_steps: self.training.valid_steps,
            save_steps: self.training.save_steps,
            early_stop: self.training.early_stop,
        }
    }

    pub fn lr_schedule(&self) -> LrSchedule {
        match self.schedule {
            ScheduleConfig::Constant => LrSchedule::Constant,
            ScheduleConfig::CosineWarmup {
                warmup_steps,
                cycles,
            } => LrSchedule::CosineWarmup {
                warmup_steps,
                total_steps: self.training.total_steps,
                cycles,
            },
        }
    }
}

fn default_amp() -> f32 {
    1.0
}

fn default_slope() -> f32 {
    0.01
}

fn default_momentum() -> f32 {
    0.9
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

fn default_cycles() -> f32 {
    0.5
}
