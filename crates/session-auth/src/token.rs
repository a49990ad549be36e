//! Token refresh operation
//!
//! Defines the `RefreshOperation` contract consumed by the client's refresh
//! coordinator, and `HttpRefresher`, which exchanges a refresh token for a
//! new credential pair at a configured token endpoint.
//!
//! The endpoint and the terminal status code are configuration, not
//! constants: which status the server uses to say "this refresh token is
//! dead" is part of the collaborator contract.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::credentials::CredentialPair;
use crate::error::{RefreshError, RefreshResult};

/// Abstraction over the credential refresh exchange.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn RefreshOperation>` shared between the client and its
/// refresh coordinator).
pub trait RefreshOperation: Send + Sync {
    /// Exchange the current pair for a fresh one.
    ///
    /// Implementations classify failures: `Terminal` when the refresh token
    /// itself is rejected, `Transient` for anything recoverable.
    fn refresh(
        &self,
        current: CredentialPair,
    ) -> Pin<Box<dyn Future<Output = RefreshResult<CredentialPair>> + Send + '_>>;
}

/// Token endpoint configuration for `HttpRefresher`.
#[derive(Debug, Clone)]
pub struct RefreshEndpoint {
    /// URL the refresh form is posted to.
    pub url: String,
    /// OAuth client identifier, included in the form when set.
    pub client_id: Option<String>,
    /// Status code that marks the refresh token as rejected.
    pub terminal_status: u16,
}

impl RefreshEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: None,
            terminal_status: 422,
        }
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn terminal_status(mut self, status: u16) -> Self {
        self.terminal_status = status;
        self
    }
}

/// Response from the token endpoint.
///
/// Servers may omit `refresh_token` when the existing one stays valid; the
/// refresher retains the previous refresh token in that case.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// HTTP implementation of `RefreshOperation`.
///
/// Posts `grant_type=refresh_token` with the current refresh token to the
/// configured endpoint. Classification: the configured terminal status means
/// the refresh token is dead; every other failure is transient.
pub struct HttpRefresher {
    client: reqwest::Client,
    endpoint: RefreshEndpoint,
}

impl HttpRefresher {
    pub fn new(client: reqwest::Client, endpoint: RefreshEndpoint) -> Self {
        Self { client, endpoint }
    }

    async fn refresh_inner(&self, current: CredentialPair) -> RefreshResult<CredentialPair> {
        let refresh_token = current.refresh_token().ok_or_else(|| {
            RefreshError::Terminal("no refresh token available for this session".into())
        })?;

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(ref id) = self.endpoint.client_id {
            form.push(("client_id", id.as_str()));
        }

        debug!(endpoint = %self.endpoint.url, "posting token refresh");
        let response = self
            .client
            .post(&self.endpoint.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| RefreshError::Transient(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            if status.as_u16() == self.endpoint.terminal_status {
                warn!(status = status.as_u16(), "refresh token rejected by token endpoint");
                return Err(RefreshError::Terminal(format!(
                    "token endpoint returned {status}: {body}"
                )));
            }

            return Err(RefreshError::Transient(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transient(format!("invalid refresh response: {e}")))?;

        // Retain the previous refresh token when the server omits one.
        let refresh = match token.refresh_token {
            Some(rt) if !rt.is_empty() => rt,
            _ => refresh_token.to_string(),
        };

        debug!("token refresh succeeded");
        Ok(CredentialPair::new(token.access_token, refresh))
    }
}

impl RefreshOperation for HttpRefresher {
    fn refresh(
        &self,
        current: CredentialPair,
    ) -> Pin<Box<dyn Future<Output = RefreshResult<CredentialPair>> + Send + '_>> {
        Box::pin(self.refresh_inner(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn refresher(server: &MockServer) -> HttpRefresher {
        HttpRefresher::new(
            reqwest::Client::new(),
            RefreshEndpoint::new(format!("{}/oauth/token", server.uri())),
        )
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_def"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "at_abc");
        assert_eq!(token.refresh_token.as_deref(), Some("rt_def"));
    }

    #[test]
    fn token_response_tolerates_missing_refresh_token() {
        let json = r#"{"access_token":"at_abc"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn endpoint_defaults_to_422_terminal() {
        let endpoint = RefreshEndpoint::new("https://auth.example.com/token");
        assert_eq!(endpoint.terminal_status, 422);
        assert!(endpoint.client_id.is_none());

        let endpoint = endpoint.terminal_status(401).client_id("app-1");
        assert_eq!(endpoint.terminal_status, 401);
        assert_eq!(endpoint.client_id.as_deref(), Some("app-1"));
    }

    #[tokio::test]
    async fn refresh_exchanges_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "refresh_token": "rt_new",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pair = refresher(&server)
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap();

        assert_eq!(pair.access_token(), Some("at_new"));
        assert_eq!(pair.refresh_token(), Some("rt_new"));
    }

    #[tokio::test]
    async fn refresh_retains_old_refresh_token_when_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "at_new"})),
            )
            .mount(&server)
            .await;

        let pair = refresher(&server)
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap();

        assert_eq!(pair.access_token(), Some("at_new"));
        assert_eq!(pair.refresh_token(), Some("rt_old"));
    }

    #[tokio::test]
    async fn terminal_status_is_classified_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(422).set_body_string("refresh token revoked"))
            .mount(&server)
            .await;

        let err = refresher(&server)
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap_err();

        assert!(err.is_terminal(), "422 must be terminal, got: {err}");
        assert!(err.to_string().contains("revoked"));
    }

    #[tokio::test]
    async fn server_error_is_classified_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = refresher(&server)
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap_err();

        assert!(!err.is_terminal(), "503 must be transient, got: {err}");
    }

    #[tokio::test]
    async fn configured_terminal_status_overrides_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let refresher = HttpRefresher::new(
            reqwest::Client::new(),
            RefreshEndpoint::new(format!("{}/oauth/token", server.uri())).terminal_status(401),
        );

        let err = refresher
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn missing_refresh_token_is_terminal() {
        let server = MockServer::start().await;
        let err = refresher(&server)
            .refresh(CredentialPair::empty())
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn client_id_is_included_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("client_id=app-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "at_new"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let refresher = HttpRefresher::new(
            reqwest::Client::new(),
            RefreshEndpoint::new(format!("{}/oauth/token", server.uri())).client_id("app-1"),
        );

        refresher
            .refresh(CredentialPair::new("at_old", "rt_old"))
            .await
            .unwrap();
    }
}
