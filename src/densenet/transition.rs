//! Transition Layer Implementation
//!
//! Transition layers reduce feature map dimensions between dense blocks.
//! They apply: BN → ReLU → 1x1 Conv → Dropout → 2x2 AvgPool

use ndarray::Array4;
use rand::Rng;

use crate::error::Result;
use crate::nn::{AvgPool2d, BatchNorm2d, Conv2d, Dropout, ParamSlot, Relu, Trainable};

/// Transition layer for dimensionality reduction
///
/// Reduces channels by compression factor θ and halves spatial dimensions
#[derive(Debug, Clone)]
pub struct TransitionLayer {
    /// Input channels
    pub in_channels: usize,

    /// Output channels (floor(in_channels * compression), at least 1)
    pub out_channels: usize,

    /// Compression factor (0 < θ <= 1)
    pub compression: f64,

    pub bn: BatchNorm2d,
    relu: Relu,
    pub conv: Conv2d,
    dropout: Dropout,
    pool: AvgPool2d,
}

impl TransitionLayer {
    /// Create a new transition layer
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        compression: f64,
        dropout_rate: f64,
        rng: &mut R,
    ) -> Self {
        let out_channels = ((in_channels as f64 * compression).floor() as usize).max(1);

        Self {
            in_channels,
            out_channels,
            compression,
            bn: BatchNorm2d::new(in_channels),
            relu: Relu::new(),
            conv: Conv2d::new(in_channels, out_channels, 1, rng),
            dropout: Dropout::new(dropout_rate as f32, rng),
            pool: AvgPool2d::new(),
        }
    }

    /// Input: [batch, in_channels, h, w]
    /// Output: [batch, out_channels, h / 2, w / 2]
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array4<f32>> {
        let normalized = self.bn.forward(x, training)?;
        let activated = self.relu.forward(&normalized, training);
        let conv_out = self.conv.forward(&activated, training)?;
        let dropped = self.dropout.forward(&conv_out, training);
        Ok(self.pool.forward(&dropped, training))
    }

    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let grad = self.pool.backward(grad_output)?;
        let grad = self.dropout.backward(&grad);
        let grad = self.conv.backward(&grad)?;
        let grad = self.relu.backward(&grad)?;
        self.bn.backward(&grad)
    }
}

impl Trainable for TransitionLayer {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        let mut params = self.bn.parameters();
        params.extend(self.conv.parameters());
        params
    }

    fn num_parameters(&self) -> usize {
        self.bn.num_parameters() + self.conv.num_parameters()
    }

    fn squared_norm(&self) -> f32 {
        self.bn.squared_norm() + self.conv.squared_norm()
    }
}
