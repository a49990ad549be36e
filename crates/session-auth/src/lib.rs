//! Session authentication library
//!
//! Provides the credential data model, the in-memory credential store, and
//! the token refresh operation for the bearer-authenticated API client. This
//! crate is a standalone library with no dependency on the client crate — it
//! can be tested and used independently.
//!
//! Credential flow:
//! 1. The application obtains an initial access/refresh pair (login flow,
//!    outside this crate) and seeds a `CredentialStore`
//! 2. The client reads the pair from the store before each request
//! 3. When the server signals expiry, the client invokes a `RefreshOperation`
//! 4. The refreshed pair replaces the stored one via `CredentialStore::write()`
//! 5. A terminal refresh failure erases the store via `CredentialStore::clear()`

pub mod credentials;
pub mod error;
pub mod token;

pub use credentials::{CredentialPair, CredentialStore, Token};
pub use error::{RefreshError, RefreshResult};
pub use token::{HttpRefresher, RefreshEndpoint, RefreshOperation, TokenResponse};
