//! Client error taxonomy
//!
//! `TransportError` covers network-level failures and is never retried
//! here. `RequestError` is what callers of `ApiClient::execute` see:
//! transport failures pass through unchanged, non-auth HTTP errors pass
//! through as `Http`, and the two refresh failure classes surface as
//! `Authentication` (terminal, credentials erased) and `Refresh`
//! (transient, credentials intact).

use thiserror::Error;

/// Network-level failure from the underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Final outcome of an executed request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network failure, propagated unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-success HTTP status passed through from the server. Also the
    /// outcome of a replayed request that failed again.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Terminal refresh failure — the session is over and credentials
    /// have been cleared. The caller should re-authenticate.
    #[error("authentication required: {0}")]
    Authentication(String),

    /// Transient refresh failure — credentials are intact and a later
    /// request may trigger the refresh flow again.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// Response body could not be decoded.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RequestError {
    /// Whether this failure requires re-authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, RequestError::Authentication(_))
    }

    /// Whether this is a pass-through HTTP error with the given status.
    pub fn is_http_status(&self, expected: u16) -> bool {
        matches!(self, RequestError::Http { status, .. } if *status == expected)
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, RequestError>;
