//! Inverted dropout

use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Zeroes activations with probability `rate` during training and scales the
/// survivors by `1 / (1 - rate)`. Identity in inference mode.
#[derive(Debug, Clone)]
pub struct Dropout {
    pub rate: f32,
    rng: StdRng,
    mask: Option<Array4<f32>>,
}

impl Dropout {
    /// `rate` must lie in [0, 1); the layer owns an RNG seeded from `rng`
    pub fn new<R: Rng + ?Sized>(rate: f32, rng: &mut R) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(rng.gen()),
            mask: None,
        }
    }

    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Array4<f32> {
        if !training || self.rate <= 0.0 {
            self.mask = None;
            return x.clone();
        }

        let rate = self.rate;
        let scale = 1.0 / (1.0 - rate);
        let rng = &mut self.rng;
        let mask = Array4::from_shape_fn(x.raw_dim(), |_| {
            if rng.gen::<f32>() < rate {
                0.0
            } else {
                scale
            }
        });

        let output = x * &mask;
        self.mask = Some(mask);
        output
    }

    /// Pass-through when the last forward was not a training pass
    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Array4<f32> {
        match self.mask.take() {
            Some(mask) => grad_output * &mask,
            None => grad_output.clone(),
        }
    }
}
