//! Configuration management
//!
//! This module handles loading and managing the TOML run configuration.
//! Every section is optional; missing keys fall back to the reference
//! CIFAR-10 run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::NormalizationScope;
use crate::densenet::DenseNetConfig;
use crate::error::{DenseNetError, Result};
use crate::training::TrainingConfig;

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding the CIFAR-10 binary batches
    pub data_dir: PathBuf,
    /// Images used for the normalization statistics
    pub normalization: NormalizationScope,
    /// Train on this many synthetic images instead of CIFAR-10
    pub synthetic_samples: Option<usize>,
    /// Seed of the synthetic generator
    pub synthetic_seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/cifar-10-batches-bin"),
            normalization: NormalizationScope::TrainAndTest,
            synthetic_samples: None,
            synthetic_seed: 0,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Experiment log, rewritten after every epoch
    pub log_file: PathBuf,
    /// Rendered model diagram
    pub diagram: PathBuf,
    /// Try to render the diagram at startup
    pub render_diagram: bool,
    /// Write the normalization statistics here; nothing is written when unset
    pub channel_stats: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("log/experiment_log_cifar10.json"),
            diagram: PathBuf::from("model.png"),
            render_diagram: true,
            channel_stats: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub model: DenseNetConfig,
    pub training: TrainingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file, or use the defaults if it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        super::ensure_parent_dir(path.as_ref())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.training.validate()?;

        if self.data.synthetic_samples == Some(0) {
            return Err(DenseNetError::InvalidConfig(
                "synthetic_samples must be positive".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(DenseNetError::InvalidConfig("logging level is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.depth, 40);
        assert_eq!(config.training.epochs, 300);
        assert_eq!(config.data.normalization, NormalizationScope::TrainAndTest);
        assert_eq!(config.output.log_file, PathBuf::from("log/experiment_log_cifar10.json"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file() {
        let parsed: Config = toml::from_str(
            r#"
            [model]
            depth = 22

            [training]
            epochs = 5
            partition = "even_split"

            [data]
            normalization = "train_only"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.model.depth, 22);
        assert_eq!(parsed.model.growth_rate, 12);
        assert_eq!(parsed.training.epochs, 5);
        assert_eq!(parsed.training.batch_size, 64);
        assert_eq!(parsed.training.partition, crate::data::PartitionStrategy::EvenSplit);
        assert_eq!(parsed.data.normalization, NormalizationScope::TrainOnly);
    }

    #[test]
    fn test_load_or_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.training.epochs = 3;
        config.save(&path).unwrap();
        assert_eq!(Config::load_or_default(&path).unwrap().training.epochs, 3);

        std::fs::write(&path, "[training]\nepochs = \"many\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(DenseNetError::TomlDe(_))));
    }

    #[test]
    fn test_channel_stats_are_opt_in() {
        assert_eq!(Config::default().output.channel_stats, None);

        let config: Config = toml::from_str("[output]\nchannel_stats = \"log/stats.json\"\n").unwrap();
        assert_eq!(config.output.channel_stats, Some(PathBuf::from("log/stats.json")));
        assert_eq!(config.output.log_file, OutputConfig::default().log_file);
    }

    #[test]
    fn test_invalid_model_section() {
        let mut config = Config::default();
        config.model.depth = 12;
        assert!(matches!(config.validate(), Err(DenseNetError::InvalidArchitecture(_))));
    }
}
