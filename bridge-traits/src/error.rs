use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Remote side asked us to slow down (HTTP 429, quota or rate-limit 403).
    #[error("Remote call throttled: {message}")]
    Throttled {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Remote side is temporarily unable to serve the request (5xx).
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure before a response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The credential was rejected (HTTP 401). Every later call will fail
    /// the same way, so the run has to halt rather than skip items.
    #[error("Credential rejected: {0}")]
    Unauthorized(String),

    /// Remote side rejected the request; retrying will not help.
    #[error("Remote call rejected (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failed operation may succeed if retried after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Throttled { .. } | BridgeError::Unavailable(_) | BridgeError::Network(_)
        )
    }

    /// Whether the failure ends the whole run instead of a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Unauthorized(_))
    }

    /// Server-provided hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BridgeError::Throttled { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
