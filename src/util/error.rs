//! Error types for corrstereo.

use crate::image::Rect;
use thiserror::Error;

/// Result alias for corrstereo operations.
pub type CorrStereoResult<T> = std::result::Result<T, CorrStereoError>;

/// Errors that can occur when building or materializing views.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CorrStereoError {
    /// Invalid kernel, search range or threshold configuration.
    #[error("invalid configuration: {reason}")]
    Config { reason: &'static str },
    /// Channel, plane or size counts disagree between composed inputs.
    #[error("format mismatch: expected {expected}, got {got}")]
    FormatMismatch { expected: String, got: String },
    /// The requested region is empty, inverted or outside the source domain.
    #[error("invalid region {bbox}: {reason}")]
    InvalidRegion { bbox: Rect, reason: &'static str },
    /// An iterative solver exhausted its iteration budget.
    #[error("optimizer did not converge after {iterations} iterations")]
    ConvergenceFailure { iterations: usize },
    /// The source lacks an optional capability.
    #[error("unsupported operation: {capability}")]
    Unsupported { capability: &'static str },
    /// The backing buffer is shorter than its format requires.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Image decoding or encoding failed.
    #[error("image i/o failed: {reason}")]
    ImageIo { reason: String },
}

impl CorrStereoError {
    pub(crate) fn format_mismatch(expected: impl ToString, got: impl ToString) -> Self {
        Self::FormatMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
