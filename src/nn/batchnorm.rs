//! Batch Normalization over feature maps
//!
//! Statistics are taken per channel across batch, height and width.
//! Training mode normalizes with batch statistics and folds them into
//! running averages; inference mode uses the running averages only.

use ndarray::{Array1, Array4, Axis, Ix1, Zip};

use super::param::{Param, ParamSlot, Trainable};
use crate::error::{DenseNetError, Result};

/// Default momentum for the running statistics
pub const BN_MOMENTUM: f32 = 0.99;

/// Default variance epsilon
pub const BN_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone)]
struct BatchNormCache {
    normalized: Array4<f32>,
    inv_std: Array1<f32>,
}

/// Per-channel batch normalization with learnable scale and shift
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    pub channels: usize,
    pub momentum: f32,
    pub epsilon: f32,

    /// Scale
    pub gamma: Param<Ix1>,

    /// Shift
    pub beta: Param<Ix1>,

    pub running_mean: Array1<f32>,
    pub running_var: Array1<f32>,

    cache: Option<BatchNormCache>,
}

impl BatchNorm2d {
    pub fn new(channels: usize) -> Self {
        Self::with_hyperparameters(channels, BN_MOMENTUM, BN_EPSILON)
    }

    pub fn with_hyperparameters(channels: usize, momentum: f32, epsilon: f32) -> Self {
        Self {
            channels,
            momentum,
            epsilon,
            gamma: Param::new(Array1::ones(channels)),
            beta: Param::new(Array1::zeros(channels)),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            cache: None,
        }
    }

    /// Input and output: [batch, channels, h, w]
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = x.dim();
        if channels != self.channels {
            return Err(DenseNetError::shape_mismatch(self.channels, channels));
        }

        if !training {
            self.cache = None;
            let mut output = x.clone();
            for (c, mut plane) in output.axis_iter_mut(Axis(1)).enumerate() {
                let inv_std = 1.0 / (self.running_var[c] + self.epsilon).sqrt();
                let (mean, gamma, beta) = (self.running_mean[c], self.gamma.value[c], self.beta.value[c]);
                plane.mapv_inplace(|v| gamma * (v - mean) * inv_std + beta);
            }
            return Ok(output);
        }

        let count = (batch * height * width) as f32;
        let mut normalized = x.clone();
        let mut inv_std = Array1::zeros(channels);

        for (c, mut plane) in normalized.axis_iter_mut(Axis(1)).enumerate() {
            let mean = plane.sum() / count;
            let var = plane.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / count;
            let scale = 1.0 / (var + self.epsilon).sqrt();
            plane.mapv_inplace(|v| (v - mean) * scale);
            inv_std[c] = scale;

            self.running_mean[c] = self.momentum * self.running_mean[c] + (1.0 - self.momentum) * mean;
            self.running_var[c] = self.momentum * self.running_var[c] + (1.0 - self.momentum) * var;
        }

        let mut output = normalized.clone();
        for (c, mut plane) in output.axis_iter_mut(Axis(1)).enumerate() {
            let (gamma, beta) = (self.gamma.value[c], self.beta.value[c]);
            plane.mapv_inplace(|v| gamma * v + beta);
        }

        self.cache = Some(BatchNormCache { normalized, inv_std });
        Ok(output)
    }

    /// Accumulate gamma/beta gradients and return the input gradient
    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let cache = self
            .cache
            .take()
            .ok_or(DenseNetError::MissingForwardCache("BatchNorm2d"))?;
        let (batch, _, height, width) = grad_output.dim();
        let count = (batch * height * width) as f32;

        let mut grad_input = Array4::zeros(grad_output.raw_dim());
        for c in 0..self.channels {
            let dy = grad_output.index_axis(Axis(1), c);
            let x_hat = cache.normalized.index_axis(Axis(1), c);

            let sum_dy = dy.sum();
            let sum_dy_xhat = Zip::from(&dy).and(&x_hat).fold(0.0f32, |acc, &g, &h| acc + g * h);

            self.beta.grad[c] += sum_dy;
            self.gamma.grad[c] += sum_dy_xhat;

            let scale = self.gamma.value[c] * cache.inv_std[c] / count;
            Zip::from(grad_input.index_axis_mut(Axis(1), c))
                .and(&dy)
                .and(&x_hat)
                .for_each(|dx, &g, &h| *dx = scale * (count * g - sum_dy - h * sum_dy_xhat));
        }

        Ok(grad_input)
    }
}

impl Trainable for BatchNorm2d {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        vec![self.gamma.slot(), self.beta.slot()]
    }

    fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }

    fn squared_norm(&self) -> f32 {
        self.gamma.squared_norm() + self.beta.squared_norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::gradcheck::{assert_input_gradient, random_tensor};

    #[test]
    fn test_training_output_is_standardized() {
        let mut bn = BatchNorm2d::new(3);
        let x = random_tensor((4, 3, 5, 5), 1).mapv(|v| 10.0 * v + 3.0);
        let y = bn.forward(&x, true).unwrap();

        for plane in y.axis_iter(Axis(1)) {
            let n = plane.len() as f32;
            let mean = plane.sum() / n;
            let var = plane.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            assert!(mean.abs() < 1e-4);
            assert!((var - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_running_statistics_move_toward_batch() {
        let mut bn = BatchNorm2d::with_hyperparameters(1, 0.5, 1e-3);
        let x = Array4::from_elem((2, 1, 2, 2), 4.0f32);
        bn.forward(&x, true).unwrap();
        assert!((bn.running_mean[0] - 2.0).abs() < 1e-6);
        assert!((bn.running_var[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_inference_uses_running_statistics() {
        let mut bn = BatchNorm2d::new(2);
        bn.running_mean.assign(&Array1::from(vec![1.0, -1.0]));
        bn.running_var.assign(&Array1::from(vec![4.0, 1.0]));

        let x = Array4::from_elem((1, 2, 1, 1), 1.0f32);
        let y = bn.forward(&x, false).unwrap();
        assert!(y[[0, 0, 0, 0]].abs() < 1e-6);
        assert!((y[[0, 1, 0, 0]] - 2.0 / (1.0f32 + 1e-3).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_input_gradient_matches_finite_differences() {
        let mut bn = BatchNorm2d::new(2);
        bn.gamma.value.assign(&Array1::from(vec![1.5, 0.7]));
        bn.beta.value.assign(&Array1::from(vec![0.2, -0.3]));
        let x = random_tensor((3, 2, 3, 3), 2);
        assert_input_gradient(&mut bn, &x, 3, |layer, input| layer.forward(input, true), |layer, grad| {
            layer.backward(grad)
        });
    }

    #[test]
    fn test_affine_gradients() {
        let mut bn = BatchNorm2d::new(1);
        let x = random_tensor((2, 1, 2, 2), 4);
        let y = bn.forward(&x, true).unwrap();
        let upstream = Array4::ones(y.raw_dim());
        bn.backward(&upstream).unwrap();

        // d/dbeta sum(y) = count, d/dgamma sum(y) = sum(x_hat) = 0
        assert!((bn.beta.grad[0] - 8.0).abs() < 1e-5);
        assert!(bn.gamma.grad[0].abs() < 1e-4);
    }
}
