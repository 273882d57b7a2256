//! 2D Convolution
//!
//! Square kernels, stride 1, "same" zero padding and no bias, which is the
//! only convolution DenseNet needs. Implemented with im2col so the inner
//! loop is a single matrix product per sample.

use ndarray::{s, Array2, Array3, Array4, ArrayView3, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use super::param::{Param, ParamSlot, Trainable};
use crate::error::{DenseNetError, Result};

/// Convolution layer with He-uniform initialized filters
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,

    /// Filters flattened to [out_channels, in_channels * k * k]
    pub weight: Param<Ix2>,

    cached_input: Option<Array4<f32>>,
}

impl Conv2d {
    /// Create a convolution with odd `kernel_size`
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        rng: &mut R,
    ) -> Self {
        debug_assert!(kernel_size % 2 == 1, "same padding needs an odd kernel");

        let fan_in = (in_channels * kernel_size * kernel_size) as f32;
        let limit = (6.0 / fan_in).sqrt();
        let weight = Array2::random_using(
            (out_channels, in_channels * kernel_size * kernel_size),
            Uniform::new(-limit, limit),
            rng,
        );

        Self {
            in_channels,
            out_channels,
            kernel_size,
            weight: Param::new(weight),
            cached_input: None,
        }
    }

    /// Input: [batch, in_channels, h, w] -> Output: [batch, out_channels, h, w]
    ///
    /// The input is cached for `backward` only on training passes.
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = x.dim();
        if channels != self.in_channels {
            return Err(DenseNetError::shape_mismatch(self.in_channels, channels));
        }

        let mut output = Array4::zeros((batch, self.out_channels, height, width));
        for (i, sample) in x.outer_iter().enumerate() {
            let cols = im2col(sample, self.kernel_size);
            let y = self
                .weight
                .value
                .dot(&cols)
                .into_shape((self.out_channels, height, width))?;
            output.slice_mut(s![i, .., .., ..]).assign(&y);
        }

        self.cached_input = training.then(|| x.clone());
        Ok(output)
    }

    /// Accumulate filter gradients and return the gradient w.r.t. the input
    pub fn backward(&mut self, grad_output: &Array4<f32>) -> Result<Array4<f32>> {
        let input = self
            .cached_input
            .take()
            .ok_or(DenseNetError::MissingForwardCache("Conv2d"))?;
        let (batch, channels, height, width) = input.dim();

        let mut grad_input = Array4::zeros(input.raw_dim());
        for i in 0..batch {
            let cols = im2col(input.slice(s![i, .., .., ..]), self.kernel_size);
            let grad = grad_output
                .slice(s![i, .., .., ..])
                .to_owned()
                .into_shape((self.out_channels, height * width))?;

            self.weight.grad += &grad.dot(&cols.t());
            let grad_cols = self.weight.value.t().dot(&grad);
            grad_input
                .slice_mut(s![i, .., .., ..])
                .assign(&col2im(&grad_cols, channels, height, width, self.kernel_size));
        }

        Ok(grad_input)
    }
}

impl Trainable for Conv2d {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        vec![self.weight.slot()]
    }

    fn num_parameters(&self) -> usize {
        self.weight.len()
    }

    fn squared_norm(&self) -> f32 {
        self.weight.squared_norm()
    }
}

/// Unfold a [channels, h, w] sample into [channels * k * k, h * w] patches
fn im2col(input: ArrayView3<f32>, k: usize) -> Array2<f32> {
    let (channels, height, width) = input.dim();
    let pad = (k / 2) as isize;
    let mut cols = Array2::zeros((channels * k * k, height * width));

    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let row = (c * k + ki) * k + kj;
                for y in 0..height {
                    let src_y = y as isize + ki as isize - pad;
                    if src_y < 0 || src_y >= height as isize {
                        continue;
                    }
                    for x in 0..width {
                        let src_x = x as isize + kj as isize - pad;
                        if src_x < 0 || src_x >= width as isize {
                            continue;
                        }
                        cols[[row, y * width + x]] = input[[c, src_y as usize, src_x as usize]];
                    }
                }
            }
        }
    }

    cols
}

/// Fold patch gradients back into a [channels, h, w] image, summing overlaps
fn col2im(cols: &Array2<f32>, channels: usize, height: usize, width: usize, k: usize) -> Array3<f32> {
    let pad = (k / 2) as isize;
    let mut image = Array3::zeros((channels, height, width));

    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let row = (c * k + ki) * k + kj;
                for y in 0..height {
                    let src_y = y as isize + ki as isize - pad;
                    if src_y < 0 || src_y >= height as isize {
                        continue;
                    }
                    for x in 0..width {
                        let src_x = x as isize + kj as isize - pad;
                        if src_x < 0 || src_x >= width as isize {
                            continue;
                        }
                        image[[c, src_y as usize, src_x as usize]] += cols[[row, y * width + x]];
                    }
                }
            }
        }
    }

    image
}
