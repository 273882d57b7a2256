//! Per-channel standardization

use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dataset::ImageDataset;
use crate::error::{DenseNetError, Result};

/// Which images contribute to the normalization statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationScope {
    /// Pool train and test pixels (reproduces the reference experiment, leaks
    /// test statistics into training)
    #[default]
    TrainAndTest,

    /// Training pixels only
    TrainOnly,
}

/// Per-channel mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl ChannelStats {
    /// Statistics over all images of all `sets`, which must share a channel count
    pub fn compute(sets: &[&Array4<f32>]) -> Result<Self> {
        let channels = sets.first().map(|s| s.len_of(Axis(1))).unwrap_or(0);
        if let Some(other) = sets.iter().find(|s| s.len_of(Axis(1)) != channels) {
            return Err(DenseNetError::shape_mismatch(channels, other.len_of(Axis(1))));
        }

        let mut mean = Vec::with_capacity(channels);
        let mut std = Vec::with_capacity(channels);
        for c in 0..channels {
            let count: usize = sets.iter().map(|s| s.index_axis(Axis(1), c).len()).sum();
            if count == 0 {
                return Err(DenseNetError::Dataset(
                    "cannot compute statistics of an empty image set".to_string(),
                ));
            }

            let sum: f64 = sets
                .iter()
                .map(|s| s.index_axis(Axis(1), c).iter().map(|&v| v as f64).sum::<f64>())
                .sum();
            let m = sum / count as f64;

            let sq: f64 = sets
                .iter()
                .map(|s| {
                    s.index_axis(Axis(1), c)
                        .iter()
                        .map(|&v| (v as f64 - m).powi(2))
                        .sum::<f64>()
                })
                .sum();

            mean.push(m as f32);
            std.push((sq / count as f64).sqrt() as f32);
        }

        Ok(Self { mean, std })
    }

    /// Standardize `images` in place; a zero-variance channel is only centred
    pub fn apply(&self, images: &mut Array4<f32>) -> Result<()> {
        let channels = images.len_of(Axis(1));
        if channels != self.mean.len() {
            return Err(DenseNetError::shape_mismatch(self.mean.len(), channels));
        }

        for (c, mut plane) in images.axis_iter_mut(Axis(1)).enumerate() {
            let mean = self.mean[c];
            let std = if self.std[c] > 0.0 { self.std[c] } else { 1.0 };
            plane.mapv_inplace(|v| (v - mean) / std);
        }

        Ok(())
    }
}

/// Compute statistics for `scope` and standardize both sets in place
pub fn normalize_datasets(
    train: &mut ImageDataset,
    test: &mut ImageDataset,
    scope: NormalizationScope,
) -> Result<ChannelStats> {
    let stats = match scope {
        NormalizationScope::TrainAndTest => {
            warn!("Normalization statistics include the test set (train_and_test scope)");
            ChannelStats::compute(&[&train.images, &test.images])?
        }
        NormalizationScope::TrainOnly => ChannelStats::compute(&[&train.images])?,
    };

    info!("Channel mean: {:?}, std: {:?}", stats.mean, stats.std);

    stats.apply(&mut train.images)?;
    stats.apply(&mut test.images)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_set(values: &[f32]) -> ImageDataset {
        let images = Array4::from_shape_fn((values.len(), 2, 1, 1), |(n, c, _, _)| {
            values[n] * (c as f32 + 1.0)
        });
        ImageDataset::new(images, vec![0; values.len()], 1).unwrap()
    }

    #[test]
    fn test_population_std() {
        let set = constant_set(&[1.0, 3.0]);
        let stats = ChannelStats::compute(&[&set.images]).unwrap();

        assert_relative_eq!(stats.mean[0], 2.0);
        assert_relative_eq!(stats.std[0], 1.0);
        assert_relative_eq!(stats.mean[1], 4.0);
        assert_relative_eq!(stats.std[1], 2.0);
    }

    #[test]
    fn test_scope_changes_statistics() {
        let mut train = constant_set(&[0.0, 2.0]);
        let mut test = constant_set(&[10.0]);

        let pooled = normalize_datasets(&mut train.clone(), &mut test.clone(), NormalizationScope::TrainAndTest).unwrap();
        assert_relative_eq!(pooled.mean[0], 4.0);

        let clean = normalize_datasets(&mut train, &mut test, NormalizationScope::TrainOnly).unwrap();
        assert_relative_eq!(clean.mean[0], 1.0);
        assert_relative_eq!(train.images[[0, 0, 0, 0]], -1.0);
        assert_relative_eq!(test.images[[0, 0, 0, 0]], 9.0);
    }

    #[test]
    fn test_normalized_pool_is_standard() {
        let mut train = ImageDataset::synthetic(12, [3, 4, 4], 3, 1).unwrap();
        let mut test = ImageDataset::synthetic(6, [3, 4, 4], 3, 2).unwrap();
        normalize_datasets(&mut train, &mut test, NormalizationScope::TrainAndTest).unwrap();

        let after = ChannelStats::compute(&[&train.images, &test.images]).unwrap();
        for c in 0..3 {
            assert!(after.mean[c].abs() < 1e-4);
            assert!((after.std[c] - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_variance_channel() {
        let mut images = Array4::from_elem((3, 1, 2, 2), 5.0);
        let stats = ChannelStats::compute(&[&images]).unwrap();
        stats.apply(&mut images).unwrap();
        assert!(images.iter().all(|&v| v == 0.0));
    }
}
