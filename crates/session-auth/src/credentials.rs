//! Credential data model and in-memory store
//!
//! The store holds exactly one access/refresh pair behind an RwLock and is
//! replaced wholesale on every write. Readers clone the current pair, so a
//! request in flight always observes either the pre-refresh or post-refresh
//! pair, never a partial update.
//!
//! The store is an explicitly owned object injected into the client at
//! construction. Its lifecycle belongs to the application session; nothing
//! here is a process-global singleton.

use std::fmt;

use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroize;

/// A bearer or refresh token. Redacted in Debug/Display/logs and zeroized
/// on drop.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw token (use sparingly).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// An access/refresh token pair.
///
/// Immutable value: a refresh produces a new pair that replaces the old one
/// in the store. Either side may be absent — a fresh install has neither, a
/// terminal refresh failure erases both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CredentialPair {
    pub access: Option<Token>,
    pub refresh: Option<Token>,
}

impl CredentialPair {
    pub fn new(access: impl Into<Token>, refresh: impl Into<Token>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    /// The logged-out pair: both tokens absent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access.as_ref().map(Token::as_str)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_ref().map(Token::as_str)
    }

    /// Whether both tokens are absent (logged-out state).
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Thread-safe holder for the session's credential pair.
///
/// Shared via `Arc` between the request path and the refresh coordinator.
/// Writes replace the whole pair under the lock; reads clone it, so no
/// caller can observe a mix of old and new tokens.
pub struct CredentialStore {
    state: RwLock<CredentialPair>,
}

impl CredentialStore {
    /// Create a store seeded with the given pair.
    pub fn new(initial: CredentialPair) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Create a store in the logged-out state.
    pub fn empty() -> Self {
        Self::new(CredentialPair::empty())
    }

    /// Snapshot the current pair.
    pub async fn read(&self) -> CredentialPair {
        self.state.read().await.clone()
    }

    /// Replace the stored pair wholesale.
    pub async fn write(&self, pair: CredentialPair) {
        let mut state = self.state.write().await;
        *state = pair;
        debug!("credential pair replaced");
    }

    /// Erase both tokens (logged-out state).
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = CredentialPair::empty();
        debug!("credentials cleared");
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn token_redacts_debug_and_display() {
        let token = Token::new("at_secret_value");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
        assert_eq!(token.as_str(), "at_secret_value");
    }

    #[test]
    fn pair_debug_does_not_leak_tokens() {
        let pair = CredentialPair::new("at_secret", "rt_secret");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("at_secret"), "got: {debug}");
        assert!(!debug.contains("rt_secret"), "got: {debug}");
    }

    #[test]
    fn empty_pair_has_no_tokens() {
        let pair = CredentialPair::empty();
        assert!(pair.is_empty());
        assert!(pair.access_token().is_none());
        assert!(pair.refresh_token().is_none());
    }

    #[test]
    fn pairs_compare_by_token_value() {
        let a = CredentialPair::new("at", "rt");
        let b = CredentialPair::new("at", "rt");
        let c = CredentialPair::new("at_other", "rt");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, CredentialPair::empty());
    }

    #[tokio::test]
    async fn store_read_write_clear() {
        let store = CredentialStore::empty();
        assert!(store.read().await.is_empty());

        store.write(CredentialPair::new("at_1", "rt_1")).await;
        let pair = store.read().await;
        assert_eq!(pair.access_token(), Some("at_1"));
        assert_eq!(pair.refresh_token(), Some("rt_1"));

        store.clear().await;
        assert!(store.read().await.is_empty());
    }

    #[tokio::test]
    async fn write_replaces_whole_pair() {
        let store = CredentialStore::new(CredentialPair::new("at_old", "rt_old"));
        store.write(CredentialPair::new("at_new", "rt_new")).await;

        let pair = store.read().await;
        assert_eq!(pair.access_token(), Some("at_new"));
        assert_eq!(pair.refresh_token(), Some("rt_new"));
    }

    #[tokio::test]
    async fn concurrent_writers_never_produce_a_mixed_pair() {
        let store = Arc::new(CredentialStore::empty());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .write(CredentialPair::new(format!("at_{i}"), format!("rt_{i}")))
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Whatever write landed last, the pair must be internally consistent.
        let pair = store.read().await;
        let access = pair.access_token().unwrap();
        let refresh = pair.refresh_token().unwrap();
        assert_eq!(
            access.strip_prefix("at_"),
            refresh.strip_prefix("rt_"),
            "access and refresh must come from the same write"
        );
    }
}
