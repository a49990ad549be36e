//! Error types for refresh operations

/// Failure of a credential refresh attempt.
///
/// `Terminal` means the refresh token itself was rejected by the server —
/// the session is over and stored credentials must be erased. `Transient`
/// covers every other failure (network errors, 5xx, undecodable bodies);
/// stored credentials stay intact and a later request may refresh again.
///
/// Clone is required so one refresh outcome can be handed to every caller
/// waiting on the same refresh cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh token rejected: {0}")]
    Terminal(String),

    #[error("token refresh failed: {0}")]
    Transient(String),
}

impl RefreshError {
    /// Whether this failure invalidates the stored credentials.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshError::Terminal(_))
    }
}

/// Result alias for refresh operations.
pub type RefreshResult<T> = std::result::Result<T, RefreshError>;
