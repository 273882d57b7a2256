//! Dense Block Implementation
//!
//! A dense block contains multiple dense layers, where each layer
//! is connected to ALL previous layers (feature concatenation).

use ndarray::{concatenate, s, Array4, Axis};
use rand::Rng;

use super::layer::DenseLayer;
use crate::error::{DenseNetError, Result};
use crate::nn::{ParamSlot, Trainable};

/// Dense Block: each layer connected to all previous layers
///
/// Layer 0: x_0 → H_0(x_0) = y_0
/// Layer 1: [x_0, y_0] → H_1([x_0, y_0]) = y_1
/// Layer 2: [x_0, y_0, y_1] → H_2([x_0, y_0, y_1]) = y_2
/// ...
#[derive(Debug, Clone)]
pub struct DenseBlock {
    /// Number of layers in this block
    pub num_layers: usize,

    /// Input channels to the block
    pub in_channels: usize,

    /// Growth rate (new channels per layer)
    pub growth_rate: usize,

    /// Output channels (in_channels + num_layers * growth_rate)
    pub out_channels: usize,

    /// The dense layers
    pub layers: Vec<DenseLayer>,
}

impl DenseBlock {
    /// Create a new dense block
    pub fn new<R: Rng + ?Sized>(
        num_layers: usize,
        in_channels: usize,
        growth_rate: usize,
        dropout_rate: f64,
        rng: &mut R,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|i| DenseLayer::new(in_channels + i * growth_rate, growth_rate, dropout_rate, rng))
            .collect();

        Self {
            num_layers,
            in_channels,
            growth_rate,
            out_channels: in_channels + num_layers * growth_rate,
            layers,
        }
    }

    /// Forward pass through the dense block
    ///
    /// Input: [batch, in_channels, h, w]
    /// Output: [batch, out_channels, h, w]
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array4<f32>> {
        let mut features = x.clone();

        for layer in &mut self.layers {
            let new_features = layer.forward(&features, training)?;
            // Concatenate along the channel axis
            features = concatenate(Axis(1), &[features.view(), new_features.view()])?;
        }

        Ok(features)
    }

    /// Backward pass; `grad_output` covers all `out_channels`
    ///
    /// Each layer saw the first `layer.in_channels` channels of the block
    /// output, so its input gradient folds back into that prefix.
    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let channels = grad_output.dim().1;
        if channels != self.out_channels {
            return Err(DenseNetError::shape_mismatch(self.out_channels, channels));
        }

        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            let start = layer.in_channels;
            let grad_new = grad.slice(s![.., start..start + layer.out_channels, .., ..]).to_owned();
            let grad_input = layer.backward(&grad_new)?;

            let mut prefix = grad.slice_mut(s![.., ..start, .., ..]);
            prefix += &grad_input;
        }

        Ok(grad.slice(s![.., ..self.in_channels, .., ..]).to_owned())
    }

    /// Get information about the block
    pub fn info(&self) -> DenseBlockInfo {
        DenseBlockInfo {
            num_layers: self.num_layers,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            growth_rate: self.growth_rate,
            parameters: self.num_parameters(),
        }
    }
}

impl Trainable for DenseBlock {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        self.layers.iter_mut().flat_map(|l| l.parameters()).collect()
    }

    fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    fn squared_norm(&self) -> f32 {
        self.layers.iter().map(|l| l.squared_norm()).sum()
    }
}

/// Information about a dense block
#[derive(Debug, Clone)]
pub struct DenseBlockInfo {
    pub num_layers: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub growth_rate: usize,
    pub parameters: usize,
}

impl std::fmt::Display for DenseBlockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DenseBlock(layers={}, in={}, out={}, k={}, params={})",
            self.num_layers, self.in_channels, self.out_channels, self.growth_rate, self.parameters
        )
    }
}
