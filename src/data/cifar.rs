//! CIFAR-10 Binary Loader
//!
//! Reads the "binary version" of CIFAR-10: each record is one label byte
//! followed by 3072 pixel bytes (1024 red, 1024 green, 1024 blue, row-major).

use std::fs;
use std::path::Path;

use ndarray::Array4;
use tracing::{debug, info};

use super::dataset::ImageDataset;
use crate::error::{DenseNetError, Result};

/// Number of classes
pub const NUM_CLASSES: usize = 10;

/// [channels, rows, cols] of one image
pub const IMAGE_SHAPE: [usize; 3] = [3, 32, 32];

/// Pixel bytes per image
pub const IMAGE_BYTES: usize = 3 * 32 * 32;

/// Label byte plus pixels
pub const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

/// Training batch files, in load order
pub const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];

/// Held-out test file
pub const TEST_FILE: &str = "test_batch.bin";

/// Human-readable class names, indexed by label
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Load the fixed train/test split from a `cifar-10-batches-bin` directory
pub fn load_cifar10<P: AsRef<Path>>(dir: P) -> Result<(ImageDataset, ImageDataset)> {
    let dir = dir.as_ref();
    info!("Loading CIFAR-10 from {}", dir.display());

    let mut pixels = Vec::new();
    let mut labels = Vec::new();
    for file in TRAIN_FILES {
        read_records(&dir.join(file), &mut pixels, &mut labels)?;
    }
    let train = into_dataset(pixels, labels)?;

    let mut pixels = Vec::new();
    let mut labels = Vec::new();
    read_records(&dir.join(TEST_FILE), &mut pixels, &mut labels)?;
    let test = into_dataset(pixels, labels)?;

    info!("Loaded {} training and {} test images", train.len(), test.len());
    Ok((train, test))
}

/// Load a single batch file
pub fn load_batch_file<P: AsRef<Path>>(path: P) -> Result<ImageDataset> {
    let mut pixels = Vec::new();
    let mut labels = Vec::new();
    read_records(path.as_ref(), &mut pixels, &mut labels)?;
    into_dataset(pixels, labels)
}

fn read_records(path: &Path, pixels: &mut Vec<f32>, labels: &mut Vec<u8>) -> Result<()> {
    let bytes = fs::read(path)
        .map_err(|e| DenseNetError::Dataset(format!("cannot read {}: {}", path.display(), e)))?;

    if bytes.is_empty() || bytes.len() % RECORD_BYTES != 0 {
        return Err(DenseNetError::Dataset(format!(
            "{} has {} bytes, not a whole number of {}-byte records",
            path.display(),
            bytes.len(),
            RECORD_BYTES
        )));
    }

    let records = bytes.len() / RECORD_BYTES;
    debug!("{}: {} records", path.display(), records);

    pixels.reserve(records * IMAGE_BYTES);
    labels.reserve(records);
    for record in bytes.chunks_exact(RECORD_BYTES) {
        labels.push(record[0]);
        pixels.extend(record[1..].iter().map(|&b| b as f32));
    }

    Ok(())
}

fn into_dataset(pixels: Vec<f32>, labels: Vec<u8>) -> Result<ImageDataset> {
    let [channels, rows, cols] = IMAGE_SHAPE;
    let images = Array4::from_shape_vec((labels.len(), channels, rows, cols), pixels)?;
    ImageDataset::new(images, labels, NUM_CLASSES)
}
