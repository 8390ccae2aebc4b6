//! Error types for the Pasale API client

use thiserror::Error;

/// Message surfaced to callers when the session cannot be recovered.
pub const AUTH_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Main error type for the Pasale API client
#[derive(Error, Debug)]
pub enum PasaleError {
    /// The access token was rejected and the refresh exchange failed too.
    ///
    /// Stored credentials have already been cleared when this is returned.
    #[error("Session expired. Please login again.")]
    AuthExpired,

    /// Non-2xx response that is not an authentication failure
    #[error("{message}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body, or the status text
        message: String,
    },

    /// Connection-level failure (DNS, refused connection, TLS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Credential storage could not be read or written
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request was cancelled through its cancellation token
    #[error("Request cancelled")]
    Cancelled,

    /// Request did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type alias for Pasale client operations
pub type Result<T> = std::result::Result<T, PasaleError>;

impl PasaleError {
    /// Create a request failure from a status code and message
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// HTTP status associated with this error, if any.
    ///
    /// `AuthExpired` reports 401. Transport-level failures have no status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired => Some(401),
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller should send the user back to the login view
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

impl From<reqwest::Error> for PasaleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Network(format!("invalid response body: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_message_and_status() {
        let err = PasaleError::AuthExpired;
        assert_eq!(err.to_string(), AUTH_EXPIRED_MESSAGE);
        assert_eq!(err.status(), Some(401));
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_request_failed_displays_server_message() {
        let err = PasaleError::request_failed(404, "Product not found");
        assert_eq!(err.to_string(), "Product not found");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_auth_expired());
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = PasaleError::network("connection refused");
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));
    }
}
