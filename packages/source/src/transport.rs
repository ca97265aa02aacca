//! The HTTP seam used by [`crate::client::RegistryClient`].
//!
//! Production code uses [`ReqwestTransport`]. Tests substitute a scripted
//! implementation so retry and rate-limit behaviour can be exercised
//! without network access.

use std::time::Duration;

use async_trait::async_trait;

use crate::ApiError;

/// A single outbound GET request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// The parts of an HTTP response the client inspects.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header value, if present.
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Performs one physical HTTP request. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if no response could be obtained (connection
    /// failure, timeout, unreadable body).
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// The connection pool is released when the transport is dropped.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("UK-Solicitors-Directory/1.0")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}
