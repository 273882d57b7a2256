//! ReLU activation

use ndarray::Array4;

use crate::error::{DenseNetError, Result};

/// Rectified linear unit that remembers which inputs were active
#[derive(Debug, Clone, Default)]
pub struct Relu {
    mask: Option<Array4<f32>>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mask is only kept for training passes
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Array4<f32> {
        self.mask = training.then(|| x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }));
        x.mapv(|v| v.max(0.0))
    }

    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let mask = self
            .mask
            .take()
            .ok_or(DenseNetError::MissingForwardCache("Relu"))?;
        Ok(grad_output * &mask)
    }
}
