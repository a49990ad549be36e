//! Bearer-authenticated API client with single-flight credential refresh
//!
//! Wraps an HTTP transport with three cooperating pieces:
//! 1. The dispatcher attaches the current bearer credential to every
//!    outgoing request and forwards it unchanged
//! 2. The interceptor classifies completed exchanges — successes and
//!    non-auth errors pass through, an authentication failure enters the
//!    refresh flow and the original request is replayed exactly once
//! 3. The refresh gate guarantees at most one refresh is in flight no
//!    matter how many requests fail concurrently; every waiter adopts the
//!    one outcome
//!
//! Credentials live in an injected `session_auth::CredentialStore`; the
//! refresh exchange itself is an injected `session_auth::RefreshOperation`.

pub mod client;
pub mod error;
pub mod gate;
pub mod request;
pub mod transport;

pub use client::{ApiClient, ClientBuilder};
pub use error::{RequestError, Result, TransportError};
pub use gate::{RefreshGate, RefreshOutcome};
pub use request::{RequestSpec, Response};
pub use transport::{HttpTransport, Transport};
