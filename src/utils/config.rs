//! Configuration management
//!
//! Provides unified configuration for the entire DCGAN pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{DatasetSource, ImageShape};
use crate::error::{Error, Result};
use crate::model::{DiscriminatorConfig, GeneratorConfig, OptimizerConfig};
use crate::training::TrainingConfig;

const DATASET_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
    /// Sample image configuration
    pub sampling: SamplingConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Labels to train on (CIFAR-10: 0 airplane ... 7 horse ... 9 truck)
    pub categories: Vec<i64>,
    /// Where images come from; also fixes the image shape
    pub source: DatasetSource,
}

/// Model-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension size
    pub latent_dim: i64,
    /// Base filters for generator
    pub gen_base_filters: i64,
    /// Base filters for discriminator
    pub disc_base_filters: i64,
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfigFile {
    /// Number of training steps
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam beta1
    pub beta1: f64,
    /// Adam beta2
    pub beta2: f64,
    /// Random seed
    pub seed: u64,
    /// Draw new smoothed labels every step
    pub refresh_labels_each_step: bool,
    /// Window for the mode-collapse warning
    pub collapse_window: usize,
    /// Show a progress bar
    pub show_progress: bool,
    /// Optional CSV path for the training history
    pub history_path: Option<String>,
    /// Device: "cpu" or "cuda"
    pub device: String,
}

/// Sample image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Render samples every N steps
    pub sample_interval: usize,
    /// Directory for `sample_<step>.png` files
    pub output_dir: String,
    /// Grid rows
    pub grid_rows: usize,
    /// Grid columns
    pub grid_cols: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                categories: vec![7],
                source: DatasetSource::default(),
            },
            model: ModelConfig {
                latent_dim: 100,
                gen_base_filters: 256,
                disc_base_filters: 32,
            },
            training: TrainingConfigFile {
                epochs: 1_000_000,
                batch_size: 32,
                learning_rate: 1e-3,
                beta1: 0.9,
                beta2: 0.999,
                seed: 42,
                refresh_labels_each_step: true,
                collapse_window: 100,
                show_progress: true,
                history_path: None,
                device: "cpu".to_string(),
            },
            sampling: SamplingConfig {
                sample_interval: 1000,
                output_dir: "images".to_string(),
                grid_rows: 4,
                grid_cols: 4,
            },
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from TOML or JSON depending on the extension
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if is_toml(path.as_ref()) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save as TOML or JSON depending on the extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        if is_toml(path.as_ref()) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Seed for dataset generation, kept apart from the training stream
    ///
    /// Synthetic pixel noise must not replay the batch, latent and label draws
    /// made from `training.seed`.
    pub fn dataset_seed(&self) -> u64 {
        self.training.seed ^ DATASET_SEED_SALT
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Shape of the images the configured source produces
    pub fn image_shape(&self) -> ImageShape {
        self.data.source.image_shape()
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            latent_dim: self.model.latent_dim,
            image_shape: self.image_shape(),
            base_filters: self.model.gen_base_filters,
        }
    }

    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            image_shape: self.image_shape(),
            base_filters: self.model.disc_base_filters,
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.training.epochs,
            batch_size: self.training.batch_size,
            sample_interval: self.sampling.sample_interval,
            categories: self.data.categories.iter().copied().collect(),
            optimizer: OptimizerConfig {
                learning_rate: self.training.learning_rate,
                beta1: self.training.beta1,
                beta2: self.training.beta2,
            },
            seed: self.training.seed,
            refresh_labels_each_step: self.training.refresh_labels_each_step,
            collapse_window: self.training.collapse_window,
            show_progress: self.training.show_progress,
            history_path: self.training.history_path.as_ref().map(PathBuf::from),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sampling.grid_rows == 0 || self.sampling.grid_cols == 0 {
            return Err(Error::ConfigurationError(
                "sample grid must have at least one row and one column".to_string(),
            ));
        }
        if let DatasetSource::Synthetic {
            images_per_class, ..
        } = &self.data.source
        {
            if *images_per_class == 0 {
                return Err(Error::ConfigurationError(
                    "synthetic dataset needs at least one image per class".to_string(),
                ));
            }
        }

        self.generator_config().validate()?;
        self.discriminator_config().validate()?;
        self.training_config().validate()
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "toml")
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        Config::load(path)
    } else {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data.categories, vec![7]);
        assert_eq!(config.model.latent_dim, 100);
        assert_eq!(config.image_shape(), ImageShape::cifar10());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let mut config = Config::default();
        config.data.source = DatasetSource::Synthetic {
            classes: vec![1, 7],
            images_per_class: 50,
            shape: ImageShape::new(16, 16, 1),
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.data.source, loaded.data.source);
        assert_eq!(loaded.image_shape(), ImageShape::new(16, 16, 1));
    }

    #[test]
    fn test_config_toml_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.training.history_path = Some("history.csv".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.data.source, config.data.source);
        assert_eq!(loaded.training.history_path.as_deref(), Some("history.csv"));
        assert_eq!(loaded.sampling.sample_interval, 1000);
    }

    #[test]
    fn test_ensure_config_exists_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = ensure_config_exists(&path).unwrap();
        assert!(path.exists());

        let loaded = ensure_config_exists(&path).unwrap();
        assert_eq!(created.training.batch_size, loaded.training.batch_size);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.training.batch_size = 8;
        assert!(matches!(config.validate(), Err(Error::ConfigurationError(_))));

        let mut config = Config::default();
        config.data.categories.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sampling.grid_rows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.source = DatasetSource::Synthetic {
            classes: vec![7],
            images_per_class: 10,
            shape: ImageShape::new(10, 10, 3),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dataset_seed_differs_from_training_seed() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut config = Config::default();
        for seed in [0, 42, u64::MAX] {
            config.training.seed = seed;
            assert_ne!(config.dataset_seed(), config.training_config().seed);

            let mut data_rng = StdRng::seed_from_u64(config.dataset_seed());
            let mut train_rng = StdRng::seed_from_u64(config.training_config().seed);
            let data: Vec<u64> = (0..4).map(|_| data_rng.gen()).collect();
            let train: Vec<u64> = (0..4).map(|_| train_rng.gen()).collect();
            assert_ne!(data, train);
        }
    }

    #[test]
    fn test_training_config_mapping() {
        let mut config = Config::default();
        config.data.categories = vec![3, 7, 3];
        config.sampling.sample_interval = 50;

        let training = config.training_config();
        assert_eq!(training.categories.len(), 2);
        assert_eq!(training.sample_interval, 50);
        assert_eq!(training.optimizer.learning_rate, 1e-3);
    }
}
