//! Error types for rho-api

use thiserror::Error;

/// Result type alias using rho-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success status
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Response body broke off or could not be read
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and detail message
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder() && !e.is_decode(),
            Error::Stream(_) => true,
            // Rate limiting and server-side failures
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short human-readable description for inline display
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { detail, .. } if !detail.is_empty() => detail.clone(),
            Error::Http(e) if e.is_connect() => "Could not connect to the server.".to_string(),
            Error::Http(e) if e.is_timeout() => "The server took too long to respond.".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_server_errors() {
        assert!(Error::api(500, "boom").is_retryable());
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(Error::api(429, "slow down").is_retryable());
    }

    #[test]
    fn test_not_retryable_client_errors() {
        assert!(!Error::api(401, "Could not validate credentials").is_retryable());
        assert!(!Error::api(404, "Conversation not found").is_retryable());
        assert!(!Error::InvalidConfig("bad url".into()).is_retryable());
    }

    #[test]
    fn test_retryable_stream_break() {
        assert!(Error::Stream("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let e = Error::api(404, "Conversation not found");
        assert_eq!(e.user_message(), "Conversation not found");
    }

    #[test]
    fn test_user_message_falls_back_to_display() {
        let e = Error::api(500, "");
        assert_eq!(e.user_message(), "API error (500): ");
    }
}
