//! Transport abstraction and the reqwest-backed implementation
//!
//! The transport returns the server's response verbatim, error statuses
//! included — classification and the refresh flow live above it in the
//! client. Only network-level failures become errors here.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::request::{RequestSpec, Response};

/// Abstraction over the HTTP call itself.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn Transport>` inside the client).
pub trait Transport: Send + Sync {
    fn send(
        &self,
        spec: RequestSpec,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Response, TransportError>> + Send + '_>>;
}

/// reqwest-backed transport bound to a base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    fn build_url(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Other(format!("invalid request path {path:?}: {e}")))
    }

    async fn send_inner(&self, spec: RequestSpec) -> std::result::Result<Response, TransportError> {
        let url = self.build_url(&spec.path)?;

        let mut request = self
            .client
            .request(spec.method.clone(), url)
            .headers(spec.headers)
            .timeout(self.timeout);
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("reading response body: {e}")))?
            .to_vec();

        debug!(method = %spec.method, path = %spec.path, status, "exchange completed");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        spec: RequestSpec,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Response, TransportError>> + Send + '_>>
    {
        Box::pin(self.send_inner(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn forwards_method_path_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(query_param("page", "3"))
            .and(header("x-trace", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let spec = RequestSpec::get("/categories")
            .query("page", "3")
            .header("x-trace", "abc");
        let response = transport(&server).send(spec).await.unwrap();

        assert_eq!(response.status, 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn error_statuses_are_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let response = transport(&server)
            .send(RequestSpec::get("/categories"))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.text(), "down");
    }

    #[tokio::test]
    async fn json_body_is_posted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/plans"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"name": "basic"}),
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server)
            .send(RequestSpec::post("/plans", serde_json::json!({"name": "basic"})))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        // Port 9 (discard) is not listening
        let transport = HttpTransport::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            Duration::from_millis(500),
        );
        let err = transport
            .send(RequestSpec::get("/anything"))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::Other(_)
            ),
            "got: {err}"
        );
    }
}
