//! Data Module
//!
//! CIFAR-10 loading, synthetic data, normalization and batching.

pub mod batching;
pub mod cifar;
pub mod dataset;
pub mod normalize;

pub use batching::{partition, PartitionStrategy};
pub use cifar::{load_cifar10, CLASS_NAMES, NUM_CLASSES};
pub use dataset::{one_hot, ImageDataset};
pub use normalize::{normalize_datasets, ChannelStats, NormalizationScope};
