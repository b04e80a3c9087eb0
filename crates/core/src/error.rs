//! Error types for phenotex

use thiserror::Error;

/// Main error type for phenotex operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read image {path}: {reason}")]
    ImageRead { path: String, reason: String },

    #[error("Insufficient dynamic range for quantization: min={min}, max={max}")]
    InsufficientDynamicRange { min: f64, max: f64 },

    #[error("GLCM computation failed: {0}")]
    GlcmComputation(String),

    #[error("Feature {feature} failed: {reason}")]
    FeatureComputation { feature: String, reason: String },

    #[error("Every cell of the feature map equals the sentinel value {sentinel}")]
    EmptyFeatureRegion { sentinel: f64 },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::ImageRead`] on `path`
    pub fn image_read(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Error::ImageRead {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for phenotex operations
pub type Result<T> = std::result::Result<T, Error>;
