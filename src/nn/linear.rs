//! Fully connected layer

use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use super::param::{Param, ParamSlot, Trainable};
use crate::error::{DenseNetError, Result};

/// Dense layer: output = input · W + b, Glorot-uniform initialized
#[derive(Debug, Clone)]
pub struct Linear {
    pub in_features: usize,
    pub out_features: usize,

    /// [in_features, out_features]
    pub weight: Param<Ix2>,
    pub bias: Param<Ix1>,

    cached_input: Option<Array2<f32>>,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (in_features + out_features) as f32).sqrt();
        let weight = Array2::random_using((in_features, out_features), Uniform::new(-limit, limit), rng);

        Self {
            in_features,
            out_features,
            weight: Param::new(weight),
            bias: Param::new(Array1::zeros(out_features)),
            cached_input: None,
        }
    }

    /// Input: [batch, in_features] -> Output: [batch, out_features]
    pub fn forward(&mut self, x: &Array2<f32>, training: bool) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features {
            return Err(DenseNetError::shape_mismatch(self.in_features, x.ncols()));
        }
        self.cached_input = training.then(|| x.clone());
        Ok(x.dot(&self.weight.value) + &self.bias.value)
    }

    pub fn backward(&mut self, grad_output: &Array2<f32>) -> Result<Array2<f32>> {
        let input = self
            .cached_input
            .take()
            .ok_or(DenseNetError::MissingForwardCache("Linear"))?;

        self.weight.grad += &input.t().dot(grad_output);
        self.bias.grad += &grad_output.sum_axis(Axis(0));
        Ok(grad_output.dot(&self.weight.value.t()))
    }
}

impl Trainable for Linear {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        vec![self.weight.slot(), self.bias.slot()]
    }

    fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    fn squared_norm(&self) -> f32 {
        self.weight.squared_norm() + self.bias.squared_norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Linear::new(2, 2, &mut rng);
        layer.weight.value = array![[1.0, 2.0], [3.0, 4.0]];
        layer.bias.value = array![0.5, -0.5];

        let y = layer.forward(&array![[1.0, 1.0]], false).unwrap();
        assert_eq!(y, array![[4.5, 5.5]]);
        assert_eq!(layer.num_parameters(), 6);
    }

    #[test]
    fn test_linear_backward() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Linear::new(2, 1, &mut rng);
        layer.weight.value = array![[2.0], [-1.0]];

        layer.forward(&array![[1.0, 3.0], [2.0, 0.0]], true).unwrap();
        let grad_input = layer.backward(&array![[1.0], [0.5]]).unwrap();

        assert_eq!(layer.weight.grad, array![[2.0], [3.0]]);
        assert_eq!(layer.bias.grad, array![1.5]);
        assert_eq!(grad_input, array![[2.0, -1.0], [1.0, -0.5]]);
    }
}
