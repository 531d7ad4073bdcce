//! Transport seam for the remote sharing API.
//!
//! An [`HttpClient`] makes one attempt per call. Pacing and retries belong to
//! the rate-limited caller in `core-revoke`, which knows which operations may
//! be repeated.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};

/// The verbs the revoke flow needs: listing reads and permission deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Delete,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL including any query string.
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Per-request override of the client's default timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("Authorization", value)
    }

    /// Appends `key=value` to the URL; the value is percent-encoded.
    pub fn query(mut self, key: &str, value: impl AsRef<str>) -> Self {
        let joiner = match self.url.contains('?') {
            true => '&',
            false => '?',
        };
        let encoded = urlencoding::encode(value.as_ref());
        self.url = format!("{}{}{}={}", self.url, joiner, key, encoded);
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

/// Whatever status the server answered with, plus the buffered body.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }

    /// Decodes the body; a malformed payload is an `OperationFailed`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("Malformed JSON body: {}", e)))
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Header value by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(key, value)| key.eq_ignore_ascii_case(name).then_some(value.as_str()))
    }
}

/// Executes a request once.
///
/// Non-2xx statuses come back as an ordinary [`HttpResponse`]. Only failures
/// to get any response are errors, reported as [`BridgeError::Network`] so
/// that callers retry them.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
