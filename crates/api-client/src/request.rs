//! Request and response descriptions
//!
//! `RequestSpec` is the client's unit of work: everything needed to issue
//! the request once, and to re-issue it unchanged after a credential
//! refresh. Resource-specific shaping (pagination parameters, filters)
//! happens in the caller; this type only carries it through.

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::{RequestError, Result};

/// An outgoing request description.
///
/// Cloneable so the interceptor can replay it after a refresh. The
/// Authorization header is attached by the dispatcher at send time, never
/// stored here.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut spec = Self::new(Method::POST, path);
        spec.body = Some(body);
        spec
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut spec = Self::new(Method::PUT, path);
        spec.body = Some(body);
        spec
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a request header. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        use reqwest::header::{HeaderName, HeaderValue};
        use std::str::FromStr;

        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// A completed HTTP exchange.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(RequestError::from)
    }

    /// Body as lossy UTF-8, for error messages and logging.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
