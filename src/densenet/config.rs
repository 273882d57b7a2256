//! DenseNet Configuration
//!
//! Architecture hyperparameters and the channel/parameter bookkeeping
//! derived from them.

use serde::{Deserialize, Serialize};

use crate::error::{DenseNetError, Result};
use crate::nn::AvgPool2d;

/// Configuration for DenseNet architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseNetConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input shape as [channels, rows, cols]
    pub input_shape: [usize; 3],

    /// Network depth; (depth - 4) must be divisible by nb_dense_block
    pub depth: usize,

    /// Number of dense blocks
    pub nb_dense_block: usize,

    /// Growth rate (k): number of new feature maps each unit produces
    pub growth_rate: usize,

    /// Channels produced by the initial convolution
    pub nb_filter: usize,

    /// Dropout rate after every convolution (0 disables dropout)
    pub dropout_rate: f64,

    /// L2 penalty coefficient applied to every parameter
    pub weight_decay: f64,

    /// Fraction of channels kept by transition layers (0 < θ <= 1)
    pub compression: f64,
}

impl Default for DenseNetConfig {
    fn default() -> Self {
        Self::cifar10()
    }
}

impl DenseNetConfig {
    /// DenseNet-40 (k = 12) for CIFAR-10
    pub fn cifar10() -> Self {
        Self {
            num_classes: 10,
            input_shape: [3, 32, 32],
            depth: 40,
            nb_dense_block: 3,
            growth_rate: crate::DEFAULT_GROWTH_RATE,
            nb_filter: 16,
            dropout_rate: 0.2,
            weight_decay: 1e-4,
            compression: crate::DEFAULT_COMPRESSION,
        }
    }

    /// Minimal network for smoke tests and demos on 8x8 inputs
    pub fn tiny() -> Self {
        Self {
            num_classes: 10,
            input_shape: [3, 8, 8],
            depth: 7,
            nb_dense_block: 3,
            growth_rate: 4,
            nb_filter: 8,
            dropout_rate: 0.0,
            weight_decay: 1e-4,
            compression: 1.0,
        }
    }

    /// DenseNet-100 (k = 12) with half-compression transitions
    pub fn large() -> Self {
        Self {
            depth: 100,
            compression: 0.5,
            nb_filter: 24,
            ..Self::cifar10()
        }
    }

    /// Number of convolutional units in each dense block
    pub fn units_per_block(&self) -> Result<usize> {
        if self.nb_dense_block == 0 {
            return Err(DenseNetError::InvalidArchitecture(
                "nb_dense_block must be positive".to_string(),
            ));
        }
        if self.depth <= 4 {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "depth must exceed 4 to hold any units, got {}",
                self.depth
            )));
        }
        let layers = self.depth - 4;
        if layers % self.nb_dense_block != 0 {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "depth - 4 = {} is not divisible by nb_dense_block = {}",
                layers, self.nb_dense_block
            )));
        }
        Ok(layers / self.nb_dense_block)
    }

    /// Channels leaving a transition fed with `channels`
    pub fn compressed_channels(&self, channels: usize) -> usize {
        ((channels as f64 * self.compression).floor() as usize).max(1)
    }

    /// (input, output) channel counts of every dense block
    pub fn block_channels(&self) -> Result<Vec<(usize, usize)>> {
        let units = self.units_per_block()?;
        let mut channels = self.nb_filter;
        let mut blocks = Vec::with_capacity(self.nb_dense_block);

        for i in 0..self.nb_dense_block {
            let out = channels + units * self.growth_rate;
            blocks.push((channels, out));
            channels = if i + 1 < self.nb_dense_block {
                self.compressed_channels(out)
            } else {
                out
            };
        }

        Ok(blocks)
    }

    /// Channels entering the classification head
    pub fn final_channels(&self) -> Result<usize> {
        let blocks = self.block_channels()?;
        Ok(blocks.last().map(|&(_, out)| out).unwrap_or(self.nb_filter))
    }

    /// Spatial size [rows, cols] after all transitions
    pub fn final_spatial(&self) -> [usize; 2] {
        let mut rows = self.input_shape[1];
        let mut cols = self.input_shape[2];
        for _ in 1..self.nb_dense_block {
            rows = AvgPool2d::output_size(rows);
            cols = AvgPool2d::output_size(cols);
        }
        [rows, cols]
    }

    /// Exact number of trainable parameters
    pub fn estimate_parameters(&self) -> Result<usize> {
        let units = self.units_per_block()?;
        let in_channels = self.input_shape[0];
        let mut total = in_channels * self.nb_filter * 9;

        let blocks = self.block_channels()?;
        for (i, &(block_in, block_out)) in blocks.iter().enumerate() {
            for j in 0..units {
                let c = block_in + j * self.growth_rate;
                // BN gamma/beta + 3x3 conv
                total += 2 * c + c * self.growth_rate * 9;
            }
            if i + 1 < blocks.len() {
                // BN gamma/beta + 1x1 conv
                total += 2 * block_out + block_out * self.compressed_channels(block_out);
            }
        }

        let final_channels = self.final_channels()?;
        total += 2 * final_channels;
        total += final_channels * self.num_classes + self.num_classes;

        Ok(total)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.units_per_block()?;

        if self.growth_rate == 0 {
            return Err(DenseNetError::InvalidArchitecture(
                "growth_rate must be positive".to_string(),
            ));
        }
        if self.nb_filter == 0 {
            return Err(DenseNetError::InvalidArchitecture(
                "nb_filter must be positive".to_string(),
            ));
        }
        if self.num_classes == 0 {
            return Err(DenseNetError::InvalidArchitecture(
                "num_classes must be positive".to_string(),
            ));
        }
        if self.input_shape.iter().any(|&d| d == 0) {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "input_shape must be non-zero, got {:?}",
                self.input_shape
            )));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        if self.compression <= 0.0 || self.compression > 1.0 {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "compression must be in (0, 1], got {}",
                self.compression
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        if self.final_spatial().iter().any(|&d| d == 0) {
            return Err(DenseNetError::InvalidArchitecture(format!(
                "input {:?} is too small for {} transitions",
                self.input_shape,
                self.nb_dense_block - 1
            )));
        }

        Ok(())
    }
}
