//! [`HttpClient`] over a pooled `reqwest` client with rustls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_CONNECTIONS_PER_HOST: usize = 10;
const USER_AGENT: &str = concat!("drive-revoke/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestHttpClient {
    inner: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds a whole request unless the request sets its own.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(IDLE_CONNECTIONS_PER_HOST)
            .user_agent(USER_AGENT)
            .build()
            .map(|inner| Self { inner })
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client setup failed: {}", e)))
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let builder = request.headers.into_iter().fold(
            self.inner.request(Self::method(request.method), &request.url),
            |builder, (name, value)| builder.header(name, value),
        );

        match request.timeout {
            Some(limit) => builder.timeout(limit),
            None => builder,
        }
    }

    /// No response arrived. Everything but a malformed request is retryable.
    fn transport_error(error: &reqwest::Error) -> BridgeError {
        if error.is_builder() {
            return BridgeError::OperationFailed(format!("Invalid request: {}", error));
        }
        let detail = if error.is_timeout() {
            "Request timed out".to_string()
        } else if error.is_connect() {
            format!("Connection failed: {}", error)
        } else {
            error.to_string()
        };
        BridgeError::Network(detail)
    }

    fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = ?request.method, "Sending request");

        let response = self.prepare(request).send().await.map_err(|e| {
            warn!(error = %e, "No response from remote");
            Self::transport_error(&e)
        })?;

        let status = response.status().as_u16();
        let headers = Self::flatten_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Network(format!("Response body interrupted: {}", e)))?;

        debug!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_builds_with_defaults() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_methods_map_to_reqwest() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Delete), Method::DELETE);
    }

    #[test]
    fn test_non_utf8_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "5".parse().unwrap());
        headers.insert(
            "x-binary",
            reqwest::header::HeaderValue::from_bytes(&[0xfa]).unwrap(),
        );

        let flat = ReqwestHttpClient::flatten_headers(&headers);
        assert_eq!(flat.get("retry-after").map(String::as_str), Some("5"));
        assert!(!flat.contains_key("x-binary"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(500)).unwrap();
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/unreachable");

        let err = client.execute(request).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
