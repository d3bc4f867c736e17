//! Classroom signaling error types.
//!
//! Error types map to coarse error codes for UI surfaces (toasts).
//! Internal details are logged but not exposed to the user.

use common::error::CommonError;
use thiserror::Error;

/// Signaling layer error type.
///
/// Maps to UI error codes:
/// - `InvalidMessage`: `BAD_REQUEST` (1)
/// - `PermissionDenied`: `FORBIDDEN` (3)
/// - `ParticipantNotFound`: `NOT_FOUND` (4)
/// - `Publish`, `Mic`, `Meeting`, `Config`, `Internal`: `INTERNAL_ERROR` (6)
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Publishing on the pub/sub channel failed.
    #[error("Publish error on {topic}: {reason}")]
    Publish { topic: &'static str, reason: String },

    /// Inbound payload failed schema validation.
    #[error("Invalid message on {topic}: {reason}")]
    InvalidMessage { topic: &'static str, reason: String },

    /// Operation requires host privileges.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Participant not found in roster or admission queue.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Local microphone operation failed.
    #[error("Microphone error: {0}")]
    Mic(String),

    /// Meeting operation (leave, navigation) failed.
    #[error("Meeting error: {0}")]
    Meeting(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel closed, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    /// Returns the UI error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SignalingError::InvalidMessage { .. } => 1, // BAD_REQUEST
            SignalingError::PermissionDenied(_) => 3,   // FORBIDDEN
            SignalingError::ParticipantNotFound(_) => 4, // NOT_FOUND
            SignalingError::Publish { .. }
            | SignalingError::Mic(_)
            | SignalingError::Meeting(_)
            | SignalingError::Config(_)
            | SignalingError::Internal(_) => 6, // INTERNAL_ERROR
        }
    }

    /// Returns a user-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SignalingError::Publish { .. } => "Could not reach the classroom, try again".to_string(),
            SignalingError::InvalidMessage { .. } => "Received a malformed message".to_string(),
            SignalingError::PermissionDenied(_) => "Only the teacher can do that".to_string(),
            SignalingError::ParticipantNotFound(_) => "Participant not found".to_string(),
            SignalingError::Mic(_) => "Microphone is unavailable".to_string(),
            SignalingError::Meeting(_) | SignalingError::Config(_) | SignalingError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl From<CommonError> for SignalingError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Configuration(msg) => SignalingError::Config(msg),
            other => SignalingError::InvalidMessage {
                topic: "-",
                reason: other.to_string(),
            },
        }
    }
}
