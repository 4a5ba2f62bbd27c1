//! Error types for the AnchorTrack environment abstraction.

use thiserror::Error;

/// Errors that can cross the environment seam.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    /// The spatial-anchoring service is not ready to accept calls.
    #[error("Anchor service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A batched detection submission failed.
    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    /// Operation timed out.
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates an unavailable-service error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Creates a detection-failure error.
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::DetectionFailed(msg.into())
    }
}
