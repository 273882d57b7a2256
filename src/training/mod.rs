//! Training Module
//!
//! Optimizer, learning-rate schedule, experiment log and the epoch loop.

pub mod log;
pub mod optimizer;
pub mod schedule;
pub mod state;
pub mod trainer;

pub use log::ExperimentLog;
pub use optimizer::{Optimizer, OptimizerConfig, Sgd};
pub use schedule::{ConstantRate, InverseTimeDecay, LearningRateSchedule, StepDown};
pub use state::{EpochMetrics, TrainingState};
pub use trainer::{Trainer, TrainingConfig};
