//! Per-epoch experiment log
//!
//! Serialized as JSON with sorted keys and a four-space indent, rewritten in
//! full after every epoch.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use super::optimizer::OptimizerConfig;
use crate::error::Result;
use crate::utils::{ensure_parent_dir, load_json};

/// Training history; fields are declared in alphabetical order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLog {
    pub batch_size: usize,

    /// Learning rate used for each epoch
    pub learning_rate: Vec<f64>,

    /// Total epochs planned for the run
    pub nb_epoch: usize,

    /// Optimizer hyperparameters, `lr` being the latest rate
    pub optimizer: OptimizerConfig,

    /// [loss, accuracy] on the held-out set per epoch
    pub test_loss: Vec<[f64; 2]>,

    /// Mean [loss, accuracy] over the training batches per epoch
    pub train_loss: Vec<[f64; 2]>,
}

impl ExperimentLog {
    pub fn new(batch_size: usize, nb_epoch: usize, optimizer: OptimizerConfig) -> Self {
        Self {
            batch_size,
            learning_rate: Vec::new(),
            nb_epoch,
            optimizer,
            test_loss: Vec::new(),
            train_loss: Vec::new(),
        }
    }

    /// Append one epoch's results
    pub fn record_epoch(
        &mut self,
        train: [f64; 2],
        test: [f64; 2],
        learning_rate: f64,
        optimizer: OptimizerConfig,
    ) {
        self.train_loss.push(train);
        self.test_loss.push(test);
        self.learning_rate.push(learning_rate);
        self.optimizer = optimizer;
    }

    /// Number of completed epochs
    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }

    /// Overwrite `path` with the full history
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let mut writer = BufWriter::new(File::create(path)?);
        let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn optimizer(lr: f64) -> OptimizerConfig {
        OptimizerConfig {
            decay: 0.0,
            lr,
            momentum: 0.9,
            nesterov: true,
        }
    }

    #[test]
    fn test_save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log").join("experiment_log_cifar10.json");

        let mut log = ExperimentLog::new(64, 3, optimizer(0.1));
        log.record_epoch([2.1, 0.2], [2.0, 0.25], 0.1, optimizer(0.1));
        log.record_epoch([1.8, 0.3], [1.9, 0.31], 0.09, optimizer(0.09));
        log.save(&path).unwrap();

        let loaded = ExperimentLog::load(&path).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.epochs(), 2);
        assert_eq!(loaded.optimizer.lr, 0.09);
    }

    #[test]
    fn test_keys_sorted_with_four_space_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        ExperimentLog::new(64, 300, optimizer(0.1)).save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"batch_size\": 64,"));
        assert!(text.contains("\n        \"decay\""));

        let keys = [
            "\"batch_size\"",
            "\"learning_rate\"",
            "\"nb_epoch\"",
            "\"optimizer\"",
            "\"test_loss\"",
            "\"train_loss\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");

        let mut log = ExperimentLog::new(2, 2, optimizer(0.1));
        log.record_epoch([1.0, 0.5], [1.0, 0.5], 0.1, optimizer(0.1));
        log.save(&path).unwrap();
        ExperimentLog::new(2, 2, optimizer(0.1)).save(&path).unwrap();

        assert_eq!(ExperimentLog::load(&path).unwrap().epochs(), 0);
    }
}
