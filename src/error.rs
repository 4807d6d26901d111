// Error handling module
// Defines the error taxonomy surfaced by every SDK operation

use thiserror::Error;

use crate::models::ApiResponse;

/// Errors that can occur while acquiring tokens or executing calls
#[derive(Error, Debug)]
pub enum ApiError {
    /// Token endpoint rejected the grant (non-200 or `ok=false`)
    #[error("Grant failed: {} - {}", .0.status, .0.error.as_deref().unwrap_or("unknown error"))]
    GrantFailed(ApiResponse),

    /// Token endpoint reported success but the payload is unusable
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Network-level failure reported by the HTTP client
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configured content type has no body encoding
    #[error("Unsupported content type: {0}")]
    InvalidContentType(String),

    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// The failure response carried by a rejected grant, if any
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            ApiError::GrantFailed(response) => Some(response),
            _ => None,
        }
    }

    /// Whether this error invalidates the credential that was being acquired
    pub fn invalidates_credential(&self) -> bool {
        matches!(
            self,
            ApiError::GrantFailed(_) | ApiError::InvalidTokenResponse(_)
        )
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ApiError>;
