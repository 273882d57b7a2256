//! # DenseNet CIFAR-10 Library
//!
//! A Rust implementation of DenseNet (Densely Connected Convolutional Networks)
//! trained on the CIFAR-10 image classification benchmark.
//!
//! ## Architecture
//!
//! DenseNet's key innovation is dense connectivity: each layer receives feature maps
//! from ALL preceding layers of its block. This enables:
//! - Excellent feature reuse
//! - Strong gradient flow
//! - Parameter efficiency
//!
//! ## Modules
//!
//! - `nn`: Layers with explicit forward/backward passes on `ndarray`
//! - `densenet`: Core DenseNet architecture implementation
//! - `data`: CIFAR-10 loading, normalization and batching
//! - `training`: SGD, learning-rate schedule, epoch loop and JSON log
//! - `utils`: Configuration, logging and I/O helpers

pub mod data;
pub mod densenet;
pub mod error;
pub mod nn;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use data::{ImageDataset, NormalizationScope, PartitionStrategy};
pub use densenet::{DenseBlock, DenseLayer, DenseNet, DenseNetConfig, TransitionLayer};
pub use error::{DenseNetError, Result};
pub use training::{ExperimentLog, LearningRateSchedule, Optimizer, Sgd, Trainer, TrainingConfig};
pub use utils::{setup_logging, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default growth rate for DenseNet layers
pub const DEFAULT_GROWTH_RATE: usize = 12;

/// Default compression factor for transition layers
pub const DEFAULT_COMPRESSION: f64 = 1.0;
