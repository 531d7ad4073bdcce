//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit or quota exceeded (429, or 403 with a rate-limit reason)
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Drive backend failed (5xx)
    #[error("Google Drive unavailable (status {status_code}): {message}")]
    ServiceUnavailable { status_code: u16, message: String },

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Permission not found on a file
    #[error("Permission {permission_id} not found on file {file_id}")]
    PermissionNotFound {
        file_id: String,
        permission_id: String,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => BridgeError::Remote {
                status: status_code,
                message,
            },
            GoogleDriveError::RateLimitExceeded {
                message,
                retry_after,
            } => BridgeError::Throttled {
                message,
                retry_after,
            },
            GoogleDriveError::ServiceUnavailable {
                status_code,
                message,
            } => BridgeError::Unavailable(format!("status {}: {}", status_code, message)),
            e @ GoogleDriveError::FileNotFound { .. } => BridgeError::Remote {
                status: 404,
                message: e.to_string(),
            },
            e @ GoogleDriveError::PermissionNotFound { .. } => BridgeError::Remote {
                status: 404,
                message: e.to_string(),
            },
            GoogleDriveError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::NetworkError(msg) => BridgeError::Network(msg),
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}
