//! Registry API client.
//!
//! Every physical request goes through the [`RateLimiter`]. Responses are
//! handled as follows:
//!
//! * 2xx: the body is parsed and returned.
//! * 429: the client sleeps for `Retry-After` seconds (falling back to the
//!   configured retry delay) and tries again. The attempt counts against
//!   the retry budget.
//! * 401 / 403: fail immediately.
//! * Any other status, and transport failures: exponential backoff of
//!   `retry_delay * 2^attempt`, up to `max_retries` additional attempts.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use uk_solicitors_config::SraApiSettings;
use uk_solicitors_register_models::RegistryResponse;

use crate::ApiError;
use crate::rate_limit::RateLimiter;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Maximum length of the response body preview kept in errors and logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Effective client configuration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiInfo {
    pub base_url: String,
    pub endpoints: EndpointInfo,
    pub rate_limit: RateLimitInfo,
    /// Seconds.
    pub timeout: u64,
    pub max_retries: u32,
    /// Seconds.
    pub retry_delay: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub organizations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitInfo {
    pub requests_per_period: usize,
    pub period_seconds: f64,
    pub delay_between_requests: f64,
}

/// Authenticated, rate-limited client for the SRA data share API.
///
/// The underlying connection resources are released when the client is
/// dropped, on success and failure paths alike.
pub struct RegistryClient {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    base_url: String,
    organizations_endpoint: String,
    key_header: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    requests_made: u32,
}

impl RegistryClient {
    /// Creates a client that sends requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if no API key is configured.
    pub fn new(settings: &SraApiSettings, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let api_key = settings.api_key()?.to_string();
        let limiter = RateLimiter::from_settings(&settings.rate_limit);

        log::info!(
            "SRA API client initialized with base URL: {}",
            settings.base_url
        );
        log::info!(
            "Rate limiter configured: {} requests per {} minutes",
            settings.rate_limit.requests_per_period,
            settings.rate_limit.period_minutes
        );

        Ok(Self {
            transport,
            limiter,
            base_url: settings.base_url.clone(),
            organizations_endpoint: settings.endpoints.organizations.clone(),
            key_header: settings.subscription_key_header.clone(),
            api_key,
            timeout: settings.timeout(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            requests_made: 0,
        })
    }

    /// Creates a client backed by a real HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn connect(settings: &SraApiSettings) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(settings.timeout())?;
        Self::new(settings, Arc::new(transport))
    }

    /// Number of physical HTTP requests issued so far, retries included.
    #[must_use]
    pub const fn requests_made(&self) -> u32 {
        self.requests_made
    }

    /// Fetches the complete organisation dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails after all retries or the
    /// response lacks `Count`/`Organisations`.
    pub async fn get_all_organizations(&mut self) -> Result<RegistryResponse, ApiError> {
        log::info!("Requesting all organizations from SRA API...");
        let start = Instant::now();

        let endpoint = self.organizations_endpoint.clone();
        let result = match self.request(&endpoint).await {
            Ok(body) => parse_registry_response(&body),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                log::info!(
                    "Successfully retrieved {} organizations (total count: {}) in {:.2}s",
                    response.organisations.len(),
                    response.count,
                    start.elapsed().as_secs_f64()
                );
                Ok(response)
            }
            Err(e) => {
                log::error!("Failed to retrieve organizations: {e}");
                Err(e)
            }
        }
    }

    /// Performs a full fetch and checks the response shape.
    ///
    /// Never fails; problems are logged and reported as `false`.
    pub async fn test_connection(&mut self) -> bool {
        log::info!("Testing SRA API connection...");
        match self.get_all_organizations().await {
            Ok(response) => {
                log::info!(
                    "Connection test successful: {} organizations available (total: {})",
                    response.organisations.len(),
                    response.count
                );
                true
            }
            Err(e) => {
                log::error!("Connection test failed: {e}");
                false
            }
        }
    }

    /// Returns the client's effective configuration. Performs no I/O.
    #[must_use]
    pub fn get_api_info(&self) -> ApiInfo {
        ApiInfo {
            base_url: self.base_url.clone(),
            endpoints: EndpointInfo {
                organizations: self.organizations_endpoint.clone(),
            },
            rate_limit: RateLimitInfo {
                requests_per_period: self.limiter.requests_per_period(),
                period_seconds: self.limiter.period().as_secs_f64(),
                delay_between_requests: self.limiter.min_delay().as_secs_f64(),
            },
            timeout: self.timeout.as_secs(),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay.as_secs_f64(),
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Sends a GET to `endpoint` with retry, returning the success body.
    async fn request(&mut self, endpoint: &str) -> Result<String, ApiError> {
        let request = HttpRequest {
            url: self.url_for(endpoint),
            headers: vec![
                (self.key_header.clone(), self.api_key.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
        };

        for attempt in 0..=self.max_retries {
            self.limiter.wait_if_needed().await;
            self.requests_made += 1;
            log::debug!("GET {} (attempt {})", request.url, attempt + 1);

            let error = match self.transport.get(&request).await {
                Ok(response) if response.is_success() => {
                    log::debug!(
                        "Request successful: {} bytes received",
                        response.body.len()
                    );
                    return Ok(response.body);
                }
                Ok(response) if response.status == 429 => {
                    let wait = self.retry_after(&response);
                    log::warn!(
                        "Rate limited by server. Waiting {:.1} seconds... ({}, attempt {})",
                        wait.as_secs_f64(),
                        request.url,
                        attempt + 1
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Ok(response) if response.status == 401 => return Err(ApiError::Auth),
                Ok(response) if response.status == 403 => return Err(ApiError::Forbidden),
                Ok(response) => {
                    let body = preview(&response.body);
                    log::warn!("HTTP {}: {body}", response.status);
                    ApiError::Status {
                        status: response.status,
                        body,
                    }
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt == self.max_retries {
                log::error!(
                    "Request to {} failed after {} attempts: {error}",
                    request.url,
                    attempt + 1
                );
                return Err(error);
            }

            let wait = self.retry_delay * 2u32.saturating_pow(attempt);
            log::warn!(
                "Request failed (attempt {}): {error}. Retrying in {:.1}s...",
                attempt + 1,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }

        Err(ApiError::RateLimited {
            attempts: self.max_retries + 1,
        })
    }

    fn retry_after(&self, response: &HttpResponse) -> Duration {
        response
            .retry_after
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(self.retry_delay)
    }
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        log::debug!("HTTP session closed");
    }
}

/// Parses a registry response body, requiring `Count` and `Organisations`.
///
/// # Errors
///
/// Returns [`ApiError::Shape`] if the body is not a JSON object or either
/// field is absent or of the wrong type.
pub fn parse_registry_response(body: &str) -> Result<RegistryResponse, ApiError> {
    let value: Value = serde_json::from_str(body).map_err(|e| ApiError::Shape {
        message: format!("response is not JSON: {e}"),
    })?;

    let Value::Object(mut map) = value else {
        return Err(ApiError::Shape {
            message: "expected a JSON object".to_string(),
        });
    };

    let count = match map.get("Count") {
        Some(count) => count.as_i64().ok_or_else(|| ApiError::Shape {
            message: format!("Count is not an integer: {count}"),
        })?,
        None => {
            return Err(ApiError::Shape {
                message: "missing Count".to_string(),
            });
        }
    };

    let organisations = match map.remove("Organisations") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ApiError::Shape {
                message: "Organisations is not a list".to_string(),
            });
        }
        None => {
            return Err(ApiError::Shape {
                message: "missing Organisations".to_string(),
            });
        }
    };

    Ok(RegistryResponse {
        count,
        organisations,
    })
}

fn preview(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_LEN {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uk_solicitors_config::Settings;

    use super::*;

    /// Replays canned responses in order and records every request.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<HttpResponse, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status(500)))
        }
    }

    fn status(code: u16) -> HttpResponse {
        HttpResponse {
            status: code,
            retry_after: None,
            body: String::new(),
        }
    }

    fn ok_body() -> HttpResponse {
        HttpResponse {
            status: 200,
            retry_after: None,
            body: r#"{"Count": 1, "Organisations": [{"Id": 1}]}"#.to_string(),
        }
    }

    fn settings() -> SraApiSettings {
        Settings::from_toml_str(
            r#"
            [data_sources.sra_api]
            api_key = "test-key"
            base_url = "https://registry.test/"
            "#,
        )
        .unwrap()
        .data_sources
        .sra_api
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_server_rate_limit() {
        let limited = HttpResponse {
            status: 429,
            retry_after: Some("2".to_string()),
            body: String::new(),
        };
        let transport = ScriptedTransport::new(vec![Ok(limited), Ok(ok_body())]);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();

        let start = Instant::now();
        let response = client.get_all_organizations().await.unwrap();

        assert_eq!(response.count, 1);
        assert_eq!(transport.calls(), 2);
        assert_eq!(client.requests_made(), 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_subscription_key_to_joined_url() {
        let transport = ScriptedTransport::new(vec![Ok(ok_body())]);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();
        client.get_all_organizations().await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "https://registry.test/datashare/api/V1/organisation/GetAll"
        );
        assert!(
            requests[0]
                .headers
                .contains(&("Ocp-Apim-Subscription-Key".to_string(), "test-key".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failures_are_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(status(401))]);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();
        assert!(matches!(
            client.get_all_organizations().await,
            Err(ApiError::Auth)
        ));
        assert_eq!(transport.calls(), 1);

        let transport = ScriptedTransport::new(vec![Ok(status(403))]);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();
        assert!(matches!(
            client.get_all_organizations().await,
            Err(ApiError::Forbidden)
        ));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_back_off_exponentially() {
        let transport =
            ScriptedTransport::new(vec![Ok(status(500)), Ok(status(502)), Ok(ok_body())]);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();

        let start = Instant::now();
        client.get_all_organizations().await.unwrap();

        assert_eq!(transport.calls(), 3);
        // 2s after the first failure, 4s after the second.
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_exhaust_retry_budget() {
        let failures = (0..4)
            .map(|_| {
                Err(ApiError::Transport {
                    message: "connection reset".to_string(),
                })
            })
            .collect();
        let transport = ScriptedTransport::new(failures);
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();

        assert!(matches!(
            client.get_all_organizations().await,
            Err(ApiError::Transport { .. })
        ));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limiting_is_reported() {
        let limited = || {
            Ok(HttpResponse {
                status: 429,
                retry_after: None,
                body: String::new(),
            })
        };
        let transport = ScriptedTransport::new((0..4).map(|_| limited()).collect());
        let mut client = RegistryClient::new(&settings(), transport.clone()).unwrap();

        let start = Instant::now();
        assert!(matches!(
            client.get_all_organizations().await,
            Err(ApiError::RateLimited { attempts: 4 })
        ));

        // Without Retry-After every 429 waits the flat 2 s retry delay,
        // never the exponential backoff.
        let elapsed = start.elapsed();
        assert_eq!(transport.calls(), 4);
        assert!(elapsed >= Duration::from_secs(8), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(9), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_test_rejects_malformed_body() {
        let malformed = HttpResponse {
            status: 200,
            retry_after: None,
            body: r#"{"Count": 3}"#.to_string(),
        };
        let transport = ScriptedTransport::new(vec![Ok(malformed)]);
        let mut client = RegistryClient::new(&settings(), transport).unwrap();
        assert!(!client.test_connection().await);

        let transport = ScriptedTransport::new(vec![Ok(ok_body())]);
        let mut client = RegistryClient::new(&settings(), transport).unwrap();
        assert!(client.test_connection().await);
    }

    #[test]
    fn response_shape_is_checked() {
        assert!(parse_registry_response("[]").is_err());
        assert!(parse_registry_response("not json").is_err());
        assert!(parse_registry_response(r#"{"Organisations": []}"#).is_err());
        assert!(parse_registry_response(r#"{"Count": 0, "Organisations": {}}"#).is_err());

        let parsed = parse_registry_response(r#"{"Count": 0, "Organisations": []}"#).unwrap();
        assert_eq!(parsed.count, 0);
        assert!(parsed.organisations.is_empty());
    }

    #[test]
    fn api_info_reflects_settings() {
        let transport = ScriptedTransport::new(Vec::new());
        let client = RegistryClient::new(&settings(), transport.clone()).unwrap();
        let info = client.get_api_info();

        assert_eq!(info.base_url, "https://registry.test/");
        assert_eq!(info.rate_limit.requests_per_period, 600);
        assert!((info.rate_limit.period_seconds - 300.0).abs() < f64::EPSILON);
        assert!((info.rate_limit.delay_between_requests - 0.5).abs() < f64::EPSILON);
        assert_eq!(info.timeout, 30);
        assert_eq!(info.max_retries, 3);
        assert!((info.retry_delay - 2.0).abs() < f64::EPSILON);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let settings = Settings::defaults().unwrap().data_sources.sra_api;
        let transport = ScriptedTransport::new(Vec::new());
        assert!(matches!(
            RegistryClient::new(&settings, transport),
            Err(ApiError::Config(_))
        ));
    }
}
