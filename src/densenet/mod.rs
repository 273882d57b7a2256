//! DenseNet Architecture Implementation
//!
//! This module implements the DenseNet (Densely Connected Convolutional Networks)
//! architecture for small-image classification.

mod block;
mod config;
mod diagram;
mod layer;
mod network;
mod transition;

pub use block::{DenseBlock, DenseBlockInfo};
pub use config::DenseNetConfig;
pub use layer::{DenseLayer, DENSE_KERNEL_SIZE};
pub use network::{DenseNet, LayerSummary};
pub use transition::TransitionLayer;
