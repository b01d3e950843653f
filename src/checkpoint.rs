use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use machine_learning::{arch::Sequential, training::Snapshot};
use serde::{Deserialize, Serialize};

use crate::{
    ForecastErr, Result, builder::ForecastBuilder, config::ActivationConfig,
    data::Standardizer,
};

/// Everything needed to rebuild a trained model and feed it test data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub layers: Vec<(usize, usize)>,
    pub activation: ActivationConfig,
    /// The table feature columns the model was trained on.
    pub features: Vec<usize>,
    pub standardizer: Option<Standardizer>,
    pub params: Vec<f32>,
    pub valid_loss: f32,
    pub step: usize,
}

impl Checkpoint {
    /// Stores the parameters and metrics of `snapshot`.
    pub fn update(&mut self, snapshot: &Snapshot) {
        self.params.clone_from(&snapshot.params);
        self.valid_loss = snapshot.valid_loss;
        self.step = snapshot.step;
    }

    /// Writes the checkpoint as pretty JSON.
    ///
    /// The file is first written next to `path` and then renamed over it, so a crash never
    /// leaves a truncated checkpoint behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = tmp_sibling(path);

        let raw = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads and validates a checkpoint.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read(path)?;
        let checkpoint: Self = serde_json::from_slice(&raw)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Checks the layers, features, standardizer and parameters agree with each other.
    pub fn validate(&self) -> Result<()> {
        let Some(&(input, _)) = self.layers.first() else {
            return Err(ForecastErr::CheckpointMismatch("no layers".into()));
        };

        if input != self.features.len() {
            return Err(ForecastErr::CheckpointMismatch(format!(
                "the first layer takes {input} inputs but {} features are stored",
                self.features.len()
            )));
        }

        if let Some(w) = self.layers.windows(2).find(|w| w[0].1 != w[1].0) {
            return Err(ForecastErr::CheckpointMismatch(format!(
                "a layer with {} outputs feeds a layer with {} inputs",
                w[0].1, w[1].0
            )));
        }

        if let Some(&(_, output)) = self.layers.last().filter(|&&(_, m)| m != 1) {
            return Err(ForecastErr::CheckpointMismatch(format!(
                "the last layer has {output} outputs, a single prediction is expected"
            )));
        }

        let size: usize = self.layers.iter().map(|(n, m)| (n + 1) * m).sum();
        if size != self.params.len() {
            return Err(ForecastErr::CheckpointMismatch(format!(
                "the layers have {size} parameters but {} are stored",
                self.params.len()
            )));
        }

        if let Some(standardizer) = &self.standardizer {
            standardizer.validate(self.features.len())?;
        }

        Ok(())
    }

    /// Rebuilds the model the parameters belong to.
    pub fn model(&self) -> Result<Sequential> {
        ForecastBuilder::new().build_model(&self.layers, self.activation)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::Model;
    use tempfile::tempdir;

    use super::*;

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            layers: vec![(2, 3), (3, 1)],
            activation: ActivationConfig::Relu,
            features: vec![40, 41],
            standardizer: None,
            params: (0..13).map(|i| i as f32 / 10.).collect(),
            valid_loss: 0.8051,
            step: 1200,
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.ckpt.json");

        checkpoint().save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        assert_eq!(loaded, checkpoint());
        assert!(!dir.path().join("model.ckpt.json.tmp").exists());
        assert_eq!(loaded.model().unwrap().size(), 13);
    }

    #[test]
    fn update_copies_the_snapshot() {
        let mut ckpt = checkpoint();
        let snapshot = Snapshot {
            params: vec![1.; 13],
            step: 20,
            valid_loss: 2.5,
        };

        ckpt.update(&snapshot);
        assert_eq!(ckpt.params, snapshot.params);
        assert_eq!((ckpt.step, ckpt.valid_loss), (20, 2.5));
    }

    #[test]
    fn mismatched_params_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.ckpt.json");

        let mut ckpt = checkpoint();
        ckpt.params.pop();
        ckpt.save(&path).unwrap();

        assert!(matches!(
            Checkpoint::load(&path),
            Err(ForecastErr::CheckpointMismatch(_))
        ));
    }

    #[test]
    fn mismatched_features_are_rejected() {
        let mut ckpt = checkpoint();
        ckpt.features.push(42);
        assert!(ckpt.validate().is_err());
    }

    #[test]
    fn a_single_output_is_required() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.ckpt.json");

        let mut ckpt = checkpoint();
        ckpt.layers = vec![(2, 0)];
        ckpt.params.clear();
        ckpt.save(&path).unwrap();

        assert!(matches!(
            Checkpoint::load(&path),
            Err(ForecastErr::CheckpointMismatch(_))
        ));
    }

    #[test]
    fn disconnected_layers_are_rejected() {
        let mut ckpt = checkpoint();
        ckpt.layers = vec![(2, 3), (2, 1)];
        ckpt.params.truncate(12);

        assert!(matches!(
            ckpt.validate(),
            Err(ForecastErr::CheckpointMismatch(_))
        ));
    }
}
