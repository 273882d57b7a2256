//! Pooling layers

use ndarray::{Array2, Array4, Axis};

use crate::error::{DenseNetError, Result};

/// 2x2 average pooling with stride 2; odd trailing rows/columns are dropped
#[derive(Debug, Clone, Default)]
pub struct AvgPool2d {
    input_dim: Option<(usize, usize, usize, usize)>,
}

impl AvgPool2d {
    pub const SIZE: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_size(size: usize) -> usize {
        size / Self::SIZE
    }

    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Array4<f32> {
        let (batch, channels, height, width) = x.dim();
        let (out_h, out_w) = (Self::output_size(height), Self::output_size(width));
        let area = (Self::SIZE * Self::SIZE) as f32;

        let mut output = Array4::zeros((batch, channels, out_h, out_w));
        for ((n, c, y, x_pos), out) in output.indexed_iter_mut() {
            let mut sum = 0.0;
            for dy in 0..Self::SIZE {
                for dx in 0..Self::SIZE {
                    sum += x[[n, c, y * Self::SIZE + dy, x_pos * Self::SIZE + dx]];
                }
            }
            *out = sum / area;
        }

        self.input_dim = training.then(|| x.dim());
        output
    }

    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let dim = self
            .input_dim
            .take()
            .ok_or(DenseNetError::MissingForwardCache("AvgPool2d"))?;
        let area = (Self::SIZE * Self::SIZE) as f32;

        let mut grad_input = Array4::zeros(dim);
        for ((n, c, y, x_pos), &g) in grad_output.indexed_iter() {
            for dy in 0..Self::SIZE {
                for dx in 0..Self::SIZE {
                    grad_input[[n, c, y * Self::SIZE + dy, x_pos * Self::SIZE + dx]] += g / area;
                }
            }
        }

        Ok(grad_input)
    }
}

/// Average over the spatial axes: [batch, channels, h, w] -> [batch, channels]
#[derive(Debug, Clone, Default)]
pub struct GlobalAvgPool {
    input_dim: Option<(usize, usize, usize, usize)>,
}

impl GlobalAvgPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Array2<f32> {
        let (_, _, height, width) = x.dim();
        self.input_dim = training.then(|| x.dim());
        x.sum_axis(Axis(3)).sum_axis(Axis(2)) / (height * width) as f32
    }

    pub fn backward(&mut self, grad_output: &Array2<f32>) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = self
            .input_dim
            .take()
            .ok_or(DenseNetError::MissingForwardCache("GlobalAvgPool"))?;
        let area = (height * width) as f32;

        Ok(Array4::from_shape_fn((batch, channels, height, width), |(n, c, _, _)| {
            grad_output[[n, c]] / area
        }))
    }
}
