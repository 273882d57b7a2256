//! Neural Network Building Blocks
//!
//! Layers used by the DenseNet, each with an explicit forward pass that
//! caches what its backward pass needs. Layers with learnable weights
//! implement [`Trainable`] so optimizers can walk their parameters.

mod activation;
mod batchnorm;
mod conv;
mod dropout;
mod linear;
mod param;
mod pool;

pub mod loss;

#[cfg(test)]
pub(crate) mod gradcheck;

pub use activation::Relu;
pub use batchnorm::{BatchNorm2d, BN_EPSILON, BN_MOMENTUM};
pub use conv::Conv2d;
pub use dropout::Dropout;
pub use linear::Linear;
pub use param::{Param, ParamSlot, Trainable};
pub use pool::{AvgPool2d, GlobalAvgPool};
