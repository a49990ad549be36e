//! Authenticated API client
//!
//! Ties the pieces together: reads the credential snapshot, attaches the
//! bearer header, sends through the transport, and classifies the response.
//! An authentication failure routes through the refresh gate; a successful
//! refresh replays the original request exactly once. The replay is
//! single-shot — a second authentication failure is surfaced, never
//! re-refreshed, so a misbehaving server cannot cause a retry loop.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_auth::{CredentialPair, CredentialStore, RefreshError, RefreshOperation};
use tracing::debug;
use url::Url;

use crate::error::{RequestError, Result, TransportError};
use crate::gate::RefreshGate;
use crate::request::{RequestSpec, Response};
use crate::transport::{HttpTransport, Transport};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single refresh attempt.
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope used by the server: `{ status, message, data }`.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Bearer-authenticated API client with transparent credential refresh.
///
/// Cheap to clone; all clones share the same credential store and refresh
/// gate, so concurrent requests across clones still collapse into a single
/// refresh per expiry.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use api_client::ApiClient;
/// use session_auth::{CredentialPair, CredentialStore, HttpRefresher, RefreshEndpoint};
///
/// # async fn example() -> api_client::Result<()> {
/// let store = Arc::new(CredentialStore::new(CredentialPair::new("at", "rt")));
/// let refresher = Arc::new(HttpRefresher::new(
///     reqwest::Client::new(),
///     RefreshEndpoint::new("https://auth.example.com/oauth/token"),
/// ));
///
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")
///     .store(store)
///     .refresher(refresher)
///     .build()?;
///
/// let categories: Vec<serde_json::Value> = client.get("/categories").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    gate: RefreshGate,
    auth_status: u16,
}

impl ApiClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Execute a request with bearer authentication and transparent refresh.
    ///
    /// Success statuses return the response; non-auth error statuses pass
    /// through as `RequestError::Http`. The configured auth-failure status
    /// triggers the refresh flow and a single replay.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Response> {
        let snapshot = self.inner.store.read().await;
        let response = self.dispatch(spec, &snapshot).await?;

        if response.status != self.inner.auth_status {
            return finish(response);
        }

        debug!(
            method = %spec.method,
            path = %spec.path,
            "authentication failure, entering refresh flow"
        );
        match self.inner.gate.coordinate(&snapshot).await {
            Ok(fresh) => {
                // Single-shot replay with the refreshed pair. Whatever comes
                // back is the final outcome, another auth failure included.
                let replayed = self.dispatch(spec, &fresh).await?;
                finish(replayed)
            }
            Err(RefreshError::Terminal(msg)) => Err(RequestError::Authentication(msg)),
            Err(RefreshError::Transient(msg)) => Err(RequestError::Refresh(msg)),
        }
    }

    /// Attach the bearer credential and forward to the transport.
    ///
    /// An absent access token means no Authorization header at all — the
    /// header is never fabricated from an empty value.
    async fn dispatch(
        &self,
        spec: &RequestSpec,
        pair: &CredentialPair,
    ) -> std::result::Result<Response, TransportError> {
        let mut outgoing = spec.clone();
        if let Some(token) = pair.access_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Other(format!("access token not header-safe: {e}")))?;
            outgoing.headers.insert(AUTHORIZATION, value);
        }

        let response = self.inner.transport.send(outgoing).await?;
        debug!(
            method = %spec.method,
            path = %spec.path,
            status = response.status,
            "request completed"
        );
        Ok(response)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Envelope convenience methods
    // ─────────────────────────────────────────────────────────────────────

    /// GET a resource, unwrapping the server's response envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_data(RequestSpec::get(path)).await
    }

    /// GET with query parameters (pagination, filters — passed through).
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut spec = RequestSpec::get(path);
        for (name, value) in query {
            spec = spec.query(*name, *value);
        }
        self.request_data(spec).await
    }

    /// POST a body, unwrapping the response envelope.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request_data(RequestSpec::post(path, body)).await
    }

    /// PUT a body, unwrapping the response envelope.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request_data(RequestSpec::put(path, body)).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(&RequestSpec::delete(path)).await?;
        Ok(())
    }

    async fn request_data<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        let response = self.execute(&spec).await?;
        let envelope: Envelope = response.json()?;
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data).map_err(RequestError::from)
    }
}

/// Classify a completed exchange: success passes through, everything else
/// becomes a pass-through HTTP error with the envelope message when the
/// server provided one.
fn finish(response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<Envelope>()
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    Err(RequestError::Http {
        status: response.status,
        message,
    })
}

/// Builder for `ApiClient`.
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    refresh_timeout: Duration,
    auth_status: u16,
    user_agent: Option<String>,
    store: Option<Arc<CredentialStore>>,
    refresher: Option<Arc<dyn RefreshOperation>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            auth_status: 401,
            user_agent: None,
            store: None,
            refresher: None,
            transport: None,
        }
    }

    /// Set the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound a single refresh attempt. A refresh that exceeds this resolves
    /// as a transient failure and the gate returns to idle.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Status code the server uses to signal an expired credential
    /// (collaborator contract, default 401).
    pub fn auth_status(mut self, status: u16) -> Self {
        self.auth_status = status;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Inject the credential store shared with the rest of the session.
    pub fn store(mut self, store: Arc<CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Inject the refresh operation.
    pub fn refresher(mut self, refresher: Arc<dyn RefreshOperation>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Replace the HTTP transport (custom stacks, tests).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let store = self
            .store
            .ok_or_else(|| RequestError::Config("credential store is required".into()))?;
        let refresher = self
            .refresher
            .ok_or_else(|| RequestError::Config("refresh operation is required".into()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self
                    .base_url
                    .ok_or_else(|| RequestError::Config("base_url is required".into()))?;
                let mut base_url = Url::parse(&base_url)
                    .map_err(|e| RequestError::Config(format!("invalid base_url: {e}")))?;
                if !base_url.path().ends_with('/') {
                    base_url.set_path(&format!("{}/", base_url.path()));
                }

                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("api-client/{}", env!("CARGO_PKG_VERSION")));

                let http = reqwest::Client::builder()
                    .default_headers(headers)
                    .user_agent(user_agent)
                    .build()
                    .map_err(|e| RequestError::Config(format!("building http client: {e}")))?;

                Arc::new(HttpTransport::new(http, base_url, self.timeout))
            }
        };

        let gate = RefreshGate::new(store.clone(), refresher, self.refresh_timeout);
        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                transport,
                store,
                gate,
                auth_status: self.auth_status,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
