//! Training loop for DenseNet
//!
//! Fixed-length runs: per epoch the learning rate is taken from the schedule,
//! the training set is swept once in mini-batches with one SGD update each,
//! the held-out set is evaluated, and the experiment log is rewritten.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array4};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::optimizer::{Optimizer, Sgd};
use super::schedule::{InverseTimeDecay, LearningRateSchedule, StepDown};
use super::state::{EpochMetrics, TrainingState};
use crate::data::{partition, ImageDataset, PartitionStrategy};
use crate::densenet::DenseNet;
use crate::error::{DenseNetError, Result};
use crate::nn::loss::{categorical_accuracy, categorical_cross_entropy, softmax_cross_entropy_grad};
use crate::nn::Trainable;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Training batch size
    pub batch_size: usize,
    /// Batch size used for evaluation only
    pub eval_batch_size: usize,
    /// Initial learning rate
    pub learning_rate: f64,
    /// Per-epoch inverse-time decay of the learning rate
    pub lr_decay: f64,
    /// One-time learning-rate divisions
    pub step_downs: Vec<StepDown>,
    /// SGD momentum
    pub momentum: f64,
    /// Nesterov momentum
    pub nesterov: bool,
    /// Per-update decay inside the optimizer
    pub optimizer_decay: f64,
    /// How the training set is cut into batches
    pub partition: PartitionStrategy,
    /// Shuffle the sample order every epoch
    pub shuffle: bool,
    /// Seed for shuffling
    pub seed: u64,
    /// Show a progress bar over the batches
    pub progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 300,
            batch_size: 64,
            eval_batch_size: 256,
            learning_rate: 0.1,
            lr_decay: 1e-4,
            step_downs: vec![StepDown::new(0.5, 10.0), StepDown::new(0.75, 100.0)],
            momentum: 0.9,
            nesterov: true,
            optimizer_decay: 0.0,
            partition: PartitionStrategy::Chunks,
            shuffle: false,
            seed: 42,
            progress: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(DenseNetError::InvalidConfig("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err(DenseNetError::InvalidConfig(
                "batch sizes must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(DenseNetError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.lr_decay < 0.0 || self.optimizer_decay < 0.0 {
            return Err(DenseNetError::InvalidConfig(
                "decay values must be non-negative".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(DenseNetError::InvalidConfig(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        if let Some(step) = self.step_downs.iter().find(|s| !(s.divisor > 0.0) || s.fraction < 0.0) {
            return Err(DenseNetError::InvalidConfig(format!(
                "invalid learning-rate step-down {:?}",
                step
            )));
        }
        Ok(())
    }

    /// SGD as configured
    pub fn build_optimizer(&self) -> Sgd {
        Sgd::new(self.learning_rate)
            .with_momentum(self.momentum)
            .with_nesterov(self.nesterov)
            .with_decay(self.optimizer_decay)
    }

    /// Inverse-time schedule as configured
    pub fn build_schedule(&self) -> InverseTimeDecay {
        InverseTimeDecay::new(self.learning_rate, self.lr_decay, self.epochs)
            .with_step_downs(self.step_downs.clone())
    }
}

/// Trainer for DenseNet models
pub struct Trainer {
    config: TrainingConfig,
    optimizer: Box<dyn Optimizer>,
    schedule: Box<dyn LearningRateSchedule>,
    log_path: Option<PathBuf>,
    rng: StdRng,
}

impl Trainer {
    /// Create a trainer with the configured SGD and schedule
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            optimizer: Box::new(config.build_optimizer()),
            schedule: Box::new(config.build_schedule()),
            log_path: None,
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_schedule(mut self, schedule: Box<dyn LearningRateSchedule>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Rewrite the experiment log at `path` after every epoch
    pub fn with_log_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run every configured epoch and return the final state
    pub fn fit(&mut self, model: &mut DenseNet, train: &ImageDataset, test: &ImageDataset) -> Result<TrainingState> {
        if train.is_empty() || test.is_empty() {
            return Err(DenseNetError::Dataset(format!(
                "need non-empty train and test sets, got {} and {}",
                train.len(),
                test.len()
            )));
        }

        info!(
            "Training on {} samples, evaluating on {}, {} epochs of batch {}",
            train.len(),
            test.len(),
            self.config.epochs,
            self.config.batch_size
        );

        let mut state = TrainingState::new(self.config.batch_size, self.config.epochs, self.optimizer.config());
        for epoch in 0..self.config.epochs {
            self.run_epoch(model, train, test, &mut state, epoch)?;
        }

        info!("Training complete after {} epochs", state.epochs_completed);
        Ok(state)
    }

    /// Train for one epoch, evaluate, and record the result in `state`
    pub fn run_epoch(
        &mut self,
        model: &mut DenseNet,
        train: &ImageDataset,
        test: &ImageDataset,
        state: &mut TrainingState,
        epoch: usize,
    ) -> Result<EpochMetrics> {
        let start = Instant::now();

        let lr = self.schedule.learning_rate(epoch);
        self.optimizer.set_learning_rate(lr);
        debug!("Epoch {} learning rate {:e}", epoch + 1, lr);

        let mut order: Vec<usize> = (0..train.len()).collect();
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }
        let batches = partition(order.len(), self.config.batch_size, self.config.partition)?;
        if batches.is_empty() {
            return Err(DenseNetError::Dataset("training set is empty".to_string()));
        }

        let pb = self.progress_bar(batches.len() as u64, epoch);
        let mut loss_sum = 0.0f64;
        let mut acc_sum = 0.0f64;

        for (batch, range) in batches.iter().enumerate() {
            let (x, y) = train.batch(&order[range.clone()])?;
            let (loss, accuracy) = self.train_on_batch(model, &x, &y)?;
            if !loss.is_finite() {
                pb.abandon();
                return Err(DenseNetError::Diverged { epoch: epoch + 1, batch, loss });
            }

            loss_sum += loss as f64;
            acc_sum += accuracy as f64;
            pb.set_message(format!("loss {:.4}", loss));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let (test_loss, test_accuracy) = self.evaluate(model, test)?;

        let metrics = EpochMetrics {
            epoch: epoch + 1,
            train_loss: loss_sum / batches.len() as f64,
            train_accuracy: acc_sum / batches.len() as f64,
            test_loss,
            test_accuracy,
            learning_rate: lr,
            duration: start.elapsed(),
        };
        state.complete_epoch(&metrics, self.optimizer.config());

        if let Some(path) = &self.log_path {
            state.log.save(path)?;
        }

        info!("Epoch {}/{} {}", metrics.epoch, self.config.epochs, metrics);
        Ok(metrics)
    }

    /// One forward/backward pass and one optimizer step
    ///
    /// Returns the regularized loss and the accuracy of the batch, both
    /// measured before the update.
    pub fn train_on_batch(&mut self, model: &mut DenseNet, x: &Array4<f32>, y: &Array2<f32>) -> Result<(f32, f32)> {
        model.zero_grad();

        let probs = model.forward(x, true)?;
        let loss = categorical_cross_entropy(&probs, y) + model.regularization_loss();
        let accuracy = categorical_accuracy(&probs, y);

        model.backward(&softmax_cross_entropy_grad(&probs, y))?;
        self.optimizer.step(model.parameters())?;

        Ok((loss, accuracy))
    }

    /// Inference-mode loss and accuracy over `data`, weighted by batch size
    ///
    /// The loss includes the L2 penalty, like the training loss.
    pub fn evaluate(&self, model: &mut DenseNet, data: &ImageDataset) -> Result<(f64, f64)> {
        let batches = partition(data.len(), self.config.eval_batch_size, PartitionStrategy::Chunks)?;
        if batches.is_empty() {
            return Err(DenseNetError::Dataset("evaluation set is empty".to_string()));
        }

        let mut loss_sum = 0.0f64;
        let mut correct = 0.0f64;
        for range in batches {
            let indices: Vec<usize> = range.collect();
            let (x, y) = data.batch(&indices)?;
            let probs = model.forward(&x, false)?;

            let n = indices.len() as f64;
            loss_sum += categorical_cross_entropy(&probs, &y) as f64 * n;
            correct += categorical_accuracy(&probs, &y) as f64 * n;
        }

        let n = data.len() as f64;
        Ok((loss_sum / n + model.regularization_loss() as f64, correct / n))
    }

    fn progress_bar(&self, len: u64, epoch: usize) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_prefix(format!("Epoch {}/{}", epoch + 1, self.config.epochs));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densenet::DenseNetConfig;
    use crate::training::ConstantRate;

    fn tiny_setup() -> (DenseNet, ImageDataset, ImageDataset) {
        let config = DenseNetConfig {
            growth_rate: 2,
            nb_filter: 4,
            ..DenseNetConfig::tiny()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let model = DenseNet::with_rng(config, &mut rng).unwrap();
        let train = ImageDataset::synthetic(6, [3, 8, 8], 10, 1).unwrap();
        let test = ImageDataset::synthetic(5, [3, 8, 8], 10, 2).unwrap();
        (model, train, test)
    }

    fn quiet_config(epochs: usize, batch_size: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            batch_size,
            eval_batch_size: 2,
            progress: false,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_default_matches_reference_run() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.epochs, 300);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.eval_batch_size, 256);
        assert!(config.nesterov);
        assert!(!config.shuffle);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(quiet_config(0, 2).validate().is_err());
        assert!(quiet_config(1, 0).validate().is_err());
        let config = TrainingConfig {
            momentum: 1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(DenseNetError::InvalidConfig(_))));
    }

    #[test]
    fn test_fit_records_every_epoch() {
        let (mut model, train, test) = tiny_setup();
        let mut trainer = Trainer::new(quiet_config(2, 4)).unwrap();

        let state = trainer.fit(&mut model, &train, &test).unwrap();
        assert_eq!(state.epochs_completed, 2);
        assert_eq!(state.log.train_loss.len(), 2);
        assert_eq!(state.log.test_loss.len(), 2);
        assert_eq!(state.log.learning_rate.len(), 2);
        assert!(state.log.train_loss.iter().all(|[loss, acc]| loss.is_finite() && (0.0..=1.0).contains(acc)));
        // Epoch 1 is the first halving point of a 2-epoch run
        assert!(state.log.learning_rate[1] < state.log.learning_rate[0]);
    }

    #[test]
    fn test_learning_rate_is_injected() {
        let (mut model, train, test) = tiny_setup();
        let mut trainer = Trainer::new(quiet_config(1, 6))
            .unwrap()
            .with_schedule(Box::new(ConstantRate(0.02)));

        let state = trainer.fit(&mut model, &train, &test).unwrap();
        assert_eq!(state.log.learning_rate, vec![0.02]);
        assert_eq!(state.log.optimizer.lr, 0.02);
    }

    #[test]
    fn test_evaluate_is_weighted() {
        let (mut model, _, test) = tiny_setup();
        let trainer = Trainer::new(quiet_config(1, 2)).unwrap();

        // 5 samples in batches of 2, 2, 1 against a single batch of 5
        let (loss, accuracy) = trainer.evaluate(&mut model, &test).unwrap();
        let indices: Vec<usize> = (0..test.len()).collect();
        let (x, y) = test.batch(&indices).unwrap();
        let probs = model.forward(&x, false).unwrap();
        let expected = categorical_cross_entropy(&probs, &y) as f64 + model.regularization_loss() as f64;

        assert!((loss - expected).abs() < 1e-4);
        assert!((accuracy - categorical_accuracy(&probs, &y) as f64).abs() < 1e-6);
    }

    #[test]
    fn test_diverged_loss_is_reported() {
        let (mut model, train, test) = tiny_setup();
        let mut trainer = Trainer::new(quiet_config(1, 3))
            .unwrap()
            .with_schedule(Box::new(ConstantRate(1e30)));

        let result = trainer.fit(&mut model, &train, &test);
        assert!(matches!(result, Err(DenseNetError::Diverged { epoch: 1, .. })));
    }

    #[test]
    fn test_empty_sets_are_rejected() {
        let (mut model, train, _) = tiny_setup();
        let empty = ImageDataset::new(Array4::zeros((0, 3, 8, 8)), Vec::new(), 10).unwrap();
        let mut trainer = Trainer::new(quiet_config(1, 2)).unwrap();
        assert!(trainer.fit(&mut model, &train, &empty).is_err());
    }
}
