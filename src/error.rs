//! Error taxonomy shared by the estimator, capture sources, and session.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterError {
    /// The permission gate reported that microphone access was refused.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Device lookup, stream construction, or buffer sizing failed.
    #[error("audio capture failed to initialize: {0}")]
    CaptureInit(String),

    /// A read delivered no samples, or claimed more than the buffer holds.
    #[error("invalid sample count {read_size} for buffer of {capacity} samples")]
    InvalidSampleCount { read_size: usize, capacity: usize },

    #[error("audio capture read failed: {0}")]
    CaptureRead(String),
}

impl MeterError {
    /// Short stable label for logs and JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            MeterError::PermissionDenied => "permission_denied",
            MeterError::CaptureInit(_) => "capture_init",
            MeterError::InvalidSampleCount { .. } => "invalid_sample_count",
            MeterError::CaptureRead(_) => "capture_read",
        }
    }

    /// Failures that end the session rather than a single iteration.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MeterError::InvalidSampleCount { .. })
    }
}
