//! Error types for the DenseNet CIFAR-10 library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, DenseNetError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum DenseNetError {
    /// Architecture parameters that cannot produce a model
    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),

    /// Training or data configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Class label outside the one-hot range
    #[error("Label {label} at index {index} is outside [0, {num_classes})")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    /// Tensor shape does not match what a layer or dataset expects
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Malformed or missing dataset files
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Training loss became NaN or infinite
    #[error("Training diverged at epoch {epoch}, batch {batch}: loss = {loss}")]
    Diverged { epoch: usize, batch: usize, loss: f32 },

    /// Backward pass requested without a cached training forward pass
    #[error("Backward called on {0} before a forward pass")]
    MissingForwardCache(&'static str),

    /// ndarray reshape/concatenate failure
    #[error("Array shape error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Configuration file write error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl DenseNetError {
    /// Build a shape mismatch error from any two debug-printable shapes
    pub fn shape_mismatch(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        DenseNetError::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}
