//! Error types for the analysis pipeline.

use std::path::PathBuf;
use thiserror::Error;

use jumpscope_models::IntervalError;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur during video analysis.
///
/// Only `InvalidIntervals` and the source errors (`FileNotFound`,
/// `VideoOpen`, `FfprobeNotFound`, `FfprobeFailed`) abort a whole batch;
/// everything else is recovered per interval.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Could not open video: {0}")]
    VideoOpen(String),

    #[error(transparent)]
    InvalidIntervals(#[from] IntervalError),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Frame annotation failed: {0}")]
    Annotation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a decode failure error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error aborts the whole batch rather than one interval.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            Self::FfprobeNotFound
                | Self::FfprobeFailed { .. }
                | Self::FileNotFound(_)
                | Self::VideoOpen(_)
                | Self::InvalidIntervals(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jumpscope_models::TimeInterval;

    #[test]
    fn test_batch_vs_interval_scope() {
        let input = VisionError::from(TimeInterval::new(2.0, 1.0).validate().unwrap_err());
        assert!(input.aborts_batch());
        assert!(VisionError::VideoOpen("bad codec".into()).aborts_batch());
        assert!(!VisionError::detection_failed("inference failed").aborts_batch());
        assert!(!VisionError::decode("truncated stream").aborts_batch());
    }
}
