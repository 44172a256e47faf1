//! Error types for gain calculation

use thiserror::Error;

/// Renderer error types
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Layout is not in the supported catalogue
    #[error("Unsupported loudspeaker layout: {0}")]
    UnsupportedLayout(String),

    /// Metadata failed validation at call time
    #[error("Invalid object metadata: {0}")]
    InvalidMetadata(String),

    /// Invalid Ambisonic order
    #[error("Invalid Ambisonic order: {0} (max supported: 3)")]
    InvalidAmbisonicOrder(usize),

    /// Channel name not present in the layout
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
