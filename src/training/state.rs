//! Mutable state threaded through the training loop

use std::fmt;
use std::time::Duration;

use super::log::ExperimentLog;
use super::optimizer::OptimizerConfig;

/// Metrics of one finished epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub learning_rate: f64,
    pub duration: Duration,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}: train_loss={:.4}, train_acc={:.4}, test_loss={:.4}, test_acc={:.4}, lr={:.3e}, time={:.1}s",
            self.epoch,
            self.train_loss,
            self.train_accuracy,
            self.test_loss,
            self.test_accuracy,
            self.learning_rate,
            self.duration.as_secs_f64()
        )
    }
}

/// Epoch log, current learning rate and progress of a run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub log: ExperimentLog,
    pub learning_rate: f64,
    pub epochs_completed: usize,
}

impl TrainingState {
    pub fn new(batch_size: usize, nb_epoch: usize, optimizer: OptimizerConfig) -> Self {
        Self {
            log: ExperimentLog::new(batch_size, nb_epoch, optimizer),
            learning_rate: optimizer.lr,
            epochs_completed: 0,
        }
    }

    /// Append a finished epoch to the log
    pub fn complete_epoch(&mut self, metrics: &EpochMetrics, optimizer: OptimizerConfig) {
        self.log.record_epoch(
            [metrics.train_loss, metrics.train_accuracy],
            [metrics.test_loss, metrics.test_accuracy],
            metrics.learning_rate,
            optimizer,
        );
        self.learning_rate = metrics.learning_rate;
        self.epochs_completed += 1;
    }

    pub fn is_finished(&self) -> bool {
        self.epochs_completed >= self.log.nb_epoch
    }
}
