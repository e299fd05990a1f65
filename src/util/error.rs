//! Error types for visearch.

use thiserror::Error;

/// Result alias for visearch operations.
pub type VisearchResult<T> = std::result::Result<T, VisearchError>;

/// Errors that can occur while computing features or running the attention loop.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VisearchError {
    /// A NaN, infinity or undefined division was produced by a numeric stage.
    #[error("numeric domain error in {stage}: {reason}")]
    NumericDomain {
        /// Pipeline stage that produced the value.
        stage: &'static str,
        /// Human-readable description of the violation.
        reason: String,
    },
    /// A precondition on input shapes or configuration was violated.
    #[error("input shape error in {context}: {reason}")]
    InputShape {
        /// Component boundary that rejected the input.
        context: &'static str,
        /// Human-readable description of the violation.
        reason: String,
    },
    /// Random resampling exceeded its retry budget.
    #[error("sampling exhausted after {attempts} attempts: {reason}")]
    SamplingExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// What kept failing.
        reason: &'static str,
    },
    /// Image or map dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("invalid stride: width {width}, stride {stride}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer is too short for the requested view.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A region of interest does not fit inside the image.
    #[error("roi ({x}, {y}, {width}x{height}) out of bounds for {img_width}x{img_height}")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// Image decoding failed.
    #[cfg(feature = "image-io")]
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}

impl VisearchError {
    pub(crate) fn shape(context: &'static str, reason: impl Into<String>) -> Self {
        Self::InputShape {
            context,
            reason: reason.into(),
        }
    }

    pub(crate) fn numeric(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::NumericDomain {
            stage,
            reason: reason.into(),
        }
    }
}
