//! Dense Layer Implementation
//!
//! A single composite unit within a dense block.
//! Each unit receives the feature maps of ALL previous units in its block.

use ndarray::Array4;
use rand::Rng;

use crate::error::Result;
use crate::nn::{BatchNorm2d, Conv2d, Dropout, ParamSlot, Relu, Trainable};

/// Kernel size of the unit's convolution
pub const DENSE_KERNEL_SIZE: usize = 3;

/// A single dense layer: BN → ReLU → Conv3x3 → Dropout
#[derive(Debug, Clone)]
pub struct DenseLayer {
    /// Input channels (block input plus all previous outputs)
    pub in_channels: usize,

    /// Output channels (growth rate)
    pub out_channels: usize,

    pub bn: BatchNorm2d,
    relu: Relu,
    pub conv: Conv2d,
    dropout: Dropout,
}

impl DenseLayer {
    /// Create a new dense layer
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        growth_rate: usize,
        dropout_rate: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            in_channels,
            out_channels: growth_rate,
            bn: BatchNorm2d::new(in_channels),
            relu: Relu::new(),
            conv: Conv2d::new(in_channels, growth_rate, DENSE_KERNEL_SIZE, rng),
            dropout: Dropout::new(dropout_rate as f32, rng),
        }
    }

    /// Forward pass through the layer
    ///
    /// Input: [batch, in_channels, h, w]
    /// Output: [batch, growth_rate, h, w]
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array4<f32>> {
        let normalized = self.bn.forward(x, training)?;
        let activated = self.relu.forward(&normalized, training);
        let conv_out = self.conv.forward(&activated, training)?;
        Ok(self.dropout.forward(&conv_out, training))
    }

    /// Backward pass; returns the gradient w.r.t. the layer input
    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let grad = self.dropout.backward(grad_output);
        let grad = self.conv.backward(&grad)?;
        let grad = self.relu.backward(&grad)?;
        self.bn.backward(&grad)
    }
}

impl Trainable for DenseLayer {
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
