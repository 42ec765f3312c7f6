//! Error types for session lifecycle, access and transcript operations.

use crate::access::DenyReason;
use crate::session::SessionStatus;
use crate::transcript::Sender;
use thiserror::Error;

/// Errors surfaced by the session core.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A referenced entity (session, candidate, job) does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is incompatible with the session's current status.
    #[error("cannot {operation} session {id} while {status}")]
    InvalidState {
        id: String,
        status: SessionStatus,
        operation: &'static str,
    },

    /// The candidate is outside their scheduled access window.
    #[error("access denied: {reason}")]
    AccessDenied {
        reason: DenyReason,
        retry_after_seconds: Option<i64>,
    },

    /// Input failed validation (e.g. a score outside 0..=100).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Speech-to-text transport failure.
    #[error("{channel} channel error: {message}")]
    Channel { channel: Sender, message: String },

    /// The live transcript for a session has already finished.
    #[error("live transcript has finished")]
    TranscriptClosed,

    /// The document store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(String),
}

impl SessionError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(id: impl ToString, status: SessionStatus, operation: &'static str) -> Self {
        Self::InvalidState {
            id: id.to_string(),
            status,
            operation,
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
