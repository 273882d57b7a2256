//! Image Dataset
//!
//! In-memory labelled image set used for training and evaluation.

use ndarray::{Array2, Array4, Axis};
use rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{DenseNetError, Result};

/// Labelled images, channel-first: [N, channels, rows, cols]
#[derive(Debug, Clone)]
pub struct ImageDataset {
    /// Pixel values
    pub images: Array4<f32>,

    /// Class index per image
    pub labels: Vec<u8>,

    /// Number of classes
    pub num_classes: usize,
}

impl ImageDataset {
    /// Create a dataset, checking that every label has a matching image and
    /// lies in `0..num_classes`
    pub fn new(images: Array4<f32>, labels: Vec<u8>, num_classes: usize) -> Result<Self> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(DenseNetError::shape_mismatch(
                labels.len(),
                images.len_of(Axis(0)),
            ));
        }
        if let Some((index, &label)) = labels
            .iter()
            .enumerate()
            .find(|&(_, &l)| l as usize >= num_classes)
        {
            return Err(DenseNetError::LabelOutOfRange {
                index,
                label: label as usize,
                num_classes,
            });
        }

        Ok(Self {
            images,
            labels,
            num_classes,
        })
    }

    /// Deterministic, learnable stand-in for CIFAR-10
    ///
    /// Each class gets a random prototype image in [0, 255]; samples blend
    /// their class prototype with uniform noise. Labels cycle through the
    /// classes so every class is present once `len >= num_classes`.
    pub fn synthetic(len: usize, input_shape: [usize; 3], num_classes: usize, seed: u64) -> Result<Self> {
        if num_classes == 0 || num_classes > u8::MAX as usize + 1 {
            return Err(DenseNetError::Dataset(format!(
                "synthetic data supports 1..=256 classes, got {}",
                num_classes
            )));
        }

        let [channels, rows, cols] = input_shape;
        let mut rng = StdRng::seed_from_u64(seed);
        let pixel = Uniform::new(0.0f32, 255.0);

        let prototypes = Array4::random_using((num_classes, channels, rows, cols), pixel, &mut rng);
        let noise = Array4::random_using((len, channels, rows, cols), pixel, &mut rng);

        let labels: Vec<u8> = (0..len).map(|i| (i % num_classes) as u8).collect();
        let mut images = noise * 0.4;
        for (mut image, &label) in images.axis_iter_mut(Axis(0)).zip(&labels) {
            image.scaled_add(0.6, &prototypes.index_axis(Axis(0), label as usize));
        }

        Self::new(images, labels, num_classes)
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// [channels, rows, cols] of a single image
    pub fn image_shape(&self) -> [usize; 3] {
        let (_, c, r, w) = self.images.dim();
        [c, r, w]
    }

    /// Images and one-hot targets for the given sample indices
    pub fn batch(&self, indices: &[usize]) -> Result<(Array4<f32>, Array2<f32>)> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DenseNetError::Dataset(format!(
                "sample index {} out of range for {} samples",
                bad,
                self.len()
            )));
        }

        let images = self.images.select(Axis(0), indices);
        let labels: Vec<u8> = indices.iter().map(|&i| self.labels[i]).collect();
        Ok((images, one_hot(&labels, self.num_classes)?))
    }

    /// Get label distribution
    pub fn label_distribution(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &label in &self.labels {
            if let Some(count) = counts.get_mut(label as usize) {
                *count += 1;
            }
        }
        counts
    }
}

/// One-hot encode `labels` into a [len, num_classes] matrix
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), num_classes));
    for (index, &label) in labels.iter().enumerate() {
        let label = label as usize;
        if label >= num_classes {
            return Err(DenseNetError::LabelOutOfRange {
                index,
                label,
                num_classes,
            });
        }
        encoded[[index, label]] = 1.0;
    }
    Ok(encoded)
}
