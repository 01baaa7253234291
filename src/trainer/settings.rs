use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::logger::ansi;
use crate::{network::LossMode, rng::MODEL_INIT_SEED, Error, Result};

/// Everything a training run needs, usually read from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Training records, already shuffled.
    pub dataset: PathBuf,
    /// Validation records. Also drives the learning rate schedule.
    pub test_dataset: Option<PathBuf>,
    /// Checkpoint to resume from.
    pub checkpoint: Option<PathBuf>,
    /// Directory to write a checkpoint to after every epoch.
    pub checkpoint_dir: Option<PathBuf>,
    /// Checkpoint whose embedding replaces the initial (or resumed) one.
    pub checkpoint_embedding: Option<PathBuf>,
    pub num_epochs: usize,
    pub batch_size: usize,
    /// Number of loader threads, also used for validation forward passes.
    pub threads: usize,
    /// Number of decoded batches that may wait in the loader's queues.
    pub batch_queue_size: usize,
    pub learning_rate: f32,
    /// Not applied by the run loop; handed to the trainer in [`super::Trainer::configure`].
    pub weight_decay: f32,
    pub scheduler_patience: usize,
    /// Scalar loss of the eval variant. Overrides the one of the variant
    /// passed to [`super::run()`]; an error for the other variants.
    pub loss_mode: Option<LossMode>,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::new(),
            test_dataset: None,
            checkpoint: None,
            checkpoint_dir: None,
            checkpoint_embedding: None,
            num_epochs: 1024,
            batch_size: 1024,
            threads: 1,
            batch_queue_size: 32,
            learning_rate: 0.001,
            weight_decay: 0.0,
            scheduler_patience: 0,
            loss_mode: None,
            seed: MODEL_INIT_SEED,
        }
    }
}

impl TrainingConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| Error::Config(format!("[{}]: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Config(msg.to_string()));

        if self.dataset.as_os_str().is_empty() {
            return fail("`dataset` is required");
        }

        if self.batch_size == 0 {
            return fail("`batch_size` must be positive");
        }

        if self.threads == 0 {
            return fail("`threads` must be positive");
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail("`learning_rate` must be positive and finite");
        }

        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return fail("`weight_decay` must be non-negative and finite");
        }

        Ok(())
    }

    pub fn display(&self) {
        let path = |p: &Option<PathBuf>| p.as_ref().map_or("-".to_string(), |p| p.display().to_string());

        println!("Dataset                : {}", ansi(self.dataset.display(), "32;1"));
        println!("Test Dataset           : {}", ansi(path(&self.test_dataset), "32;1"));
        println!("Output Path            : {}", ansi(path(&self.checkpoint_dir), "32;1"));
        println!("Epochs                 : {}", ansi(self.num_epochs, 31));
        println!("Batch Size             : {}", ansi(self.batch_size, 31));
        println!("Threads                : {}", ansi(self.threads, 31));
        println!("Weight Decay           : {}", ansi(self.weight_decay, 31));
        if let Some(mode) = self.loss_mode {
            println!("Loss                   : {}", ansi(mode, 31));
        }
        println!("Seed                   : {}", ansi(format!("{:#x}", self.seed), 31));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: TrainingConfig = toml::from_str(
            r#"
            dataset = "train.bin"
            test_dataset = "test.bin"
            loss_mode = "bce"
            batch_size = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset, PathBuf::from("train.bin"));
        assert_eq!(config.test_dataset, Some(PathBuf::from("test.bin")));
        assert_eq!(config.loss_mode, Some(LossMode::Bce));
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.num_epochs, 1024);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.seed, 0x1234_5678);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loss_mode_is_optional() {
        let config: TrainingConfig = toml::from_str("dataset = \"train.bin\"").unwrap();
        assert_eq!(config.loss_mode, None);
        assert!(toml::from_str::<TrainingConfig>("dataset = \"a\"\nloss_mode = \"l1\"").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<TrainingConfig>("dataset = \"a\"\nbatchsize = 3").is_err());
    }

    #[test]
    fn validation() {
        let base = TrainingConfig { dataset: "x.bin".into(), ..Default::default() };
        assert!(base.validate().is_ok());

        assert!(matches!(TrainingConfig::default().validate(), Err(Error::Config(_))));
        assert!(TrainingConfig { batch_size: 0, ..base.clone() }.validate().is_err());
        assert!(TrainingConfig { learning_rate: f32::NAN, ..base.clone() }.validate().is_err());
        assert!(TrainingConfig { weight_decay: -1.0, ..base }.validate().is_err());
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.toml");

        std::fs::write(&path, "dataset = \"d.bin\"\nthreads = 4\n").unwrap();
        assert_eq!(TrainingConfig::from_toml_file(&path).unwrap().threads, 4);

        std::fs::write(&path, "threads = 4\n").unwrap();
        assert!(matches!(TrainingConfig::from_toml_file(&path), Err(Error::Config(_))));
    }
}
