//! HTTP client with retry and rate limiting
//!
//! Provides the transport used by every stream:
//! - Credentials applied on every attempt through an [`AuthProvider`]
//! - Client-side quota through [`RateLimiter`]
//! - Retries decided by [`RetryPolicy`]
//! - JSON body decoding into [`ApiResponse`]

use super::classify::ErrorClassifier;
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::retry::{BackoffDecision, Failure, RetryConfig, RetryPolicy};
use crate::auth::{AuthProvider, Authenticator};
use crate::error::{Error, Result};
use crate::types::Method;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy tunables
    pub retry: RetryConfig,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("tidemark/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set retry tunables
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set rate limiter
    #[must_use]
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A decoded successful response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// JSON body (`Null` when the body was empty)
    pub body: Value,
}

/// Outcome of a single attempt
enum Attempt {
    Done(ApiResponse),
    Status {
        status: u16,
        retry_after: Option<f64>,
        body: Value,
    },
    Transport(reqwest::Error),
}

/// HTTP client with retry and rate limiting
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    auth: Arc<dyn AuthProvider>,
    retry: RetryPolicy,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let retry = RetryPolicy::new(config.retry.clone());

        Ok(Self {
            client,
            config,
            auth: Arc::new(Authenticator::default()),
            retry,
            rate_limiter,
        })
    }

    /// Use a credential provider
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    /// Use a provider-specific error classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.retry = self.retry.with_classifier(classifier);
        self
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<ApiResponse> {
        self.request(Method::GET, url, &config).await
    }

    /// Make a request, retrying per the configured policy
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<ApiResponse> {
        let full_url = self.build_url(url);
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            let (decision, error) = match self.send_once(method, &full_url, config).await? {
                Attempt::Done(response) => {
                    debug!(url = %full_url, status = response.status, attempt, "Request succeeded");
                    return Ok(response);
                }
                Attempt::Status {
                    status,
                    retry_after,
                    body,
                } => {
                    let failure = Failure::Status {
                        status,
                        retry_after,
                        body: &body,
                    };
                    let decision = self.retry.decide(&failure, attempt, waited);
                    (decision, self.status_error(status, retry_after, &body, &full_url))
                }
                Attempt::Transport(e) => {
                    let Some(decision) = self.retry.decide(&Failure::Transport(&e), attempt, waited)
                    else {
                        return Err(Error::Http(e));
                    };
                    let error = Error::transient(format!("{} on {full_url}: {e}", error_kind(&e)));
                    (Some(decision), error)
                }
            };

            match decision {
                Some(BackoffDecision::RetryAfter(wait)) => {
                    warn!(
                        url = %full_url,
                        attempt = attempt + 1,
                        max_tries = self.retry.config().max_tries,
                        wait_ms = wait.as_millis() as u64,
                        error = %error,
                        "Request failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    waited += wait;
                    attempt += 1;
                }
                Some(BackoffDecision::Fatal(reason)) => {
                    warn!(url = %full_url, attempt = attempt + 1, %reason, "Backoff cannot succeed");
                    return Err(Error::fatal(format!("{error} ({reason})")));
                }
                Some(BackoffDecision::GiveUp) | None => {
                    warn!(url = %full_url, attempt = attempt + 1, error = %error, "Giving up on request");
                    return Err(error);
                }
            }
        }
    }

    /// Send one attempt: rate limit, authenticate, send, read the body
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<Attempt> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let req = self.auth.apply(self.build_request(method, url, config)).await?;

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Transport(e)),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if response.status().is_success() {
            return match response.text().await {
                Ok(text) => Ok(Attempt::Done(ApiResponse {
                    status,
                    headers,
                    body: parse_body(&text)?,
                })),
                Err(e) => Ok(Attempt::Transport(e)),
            };
        }

        let retry_after = parse_retry_after(&headers);
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(Attempt::Status {
            status,
            retry_after,
            body,
        })
    }

    /// Surface error for a failed status, shaped by what kind of failure it was
    fn status_error(&self, status: u16, retry_after: Option<f64>, body: &Value, url: &str) -> Error {
        let classifier = self.retry.classifier();
        let message = classifier
            .message(body)
            .unwrap_or_else(|| format!("request to {url} failed"));

        let limited = status == 429
            || ((400..500).contains(&status) && classifier.is_limit_exceeded(status, body));

        if limited {
            Error::RateLimited {
                retry_after_seconds: retry_after.map(|s| s.ceil() as u64),
                message,
            }
        } else if status >= 500 {
            Error::transient(format!("HTTP {status}: {message}"))
        } else {
            Error::client(status, message)
        }
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method.into(), url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        for (key, value) in &config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !config.query.is_empty() {
            req = req.query(&config.query);
        }

        if let Some(ref body) = config.body {
            req = req.json(body);
        }

        req
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

fn error_kind(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failure"
    } else if error.is_body() || error.is_decode() {
        "truncated payload"
    } else {
        "transport failure"
    }
}

/// Decode a success body; an empty body is `Null`
fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| Error::decode(format!("invalid JSON body: {e}")))
}

/// `Retry-After` as seconds; accepts delta-seconds (fractional allowed) or an HTTP date
fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<f64>() {
        return Some(seconds);
    }

    DateTime::parse_from_rfc2822(raw).ok().map(|at| {
        let delta = at.with_timezone(&Utc) - Utc::now();
        (delta.num_milliseconds().max(0) as f64) / 1000.0
    })
}
