//! Retry policy
//!
//! Decides, for every failed attempt, whether to wait and retry, give up, or
//! abort the stream outright. Waits grow as `factor * 2^attempt` with no
//! jitter. The policy is pure; the client owns the sleeping.
//!
//! | Failure                               | Decision                          |
//! |---------------------------------------|-----------------------------------|
//! | 429 with `Retry-After >= max_time`    | Fatal, no further attempt         |
//! | 429 otherwise                         | wait `Retry-After` or backoff     |
//! | 4xx carrying a provider limit code    | backoff                           |
//! | any other 4xx                         | give up                           |
//! | 5xx, timeout, disconnect, truncation  | backoff                           |
//! | anything else                         | unclassified, re-raised unchanged |

use super::classify::{DefaultClassifier, ErrorClassifier};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for the retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_tries: u32,
    /// Base unit of the exponential wait
    pub factor: Duration,
    /// Upper bound on cumulative waiting for one request
    pub max_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 5,
            factor: Duration::from_secs(5),
            max_time: Duration::from_secs(600),
        }
    }
}

impl RetryConfig {
    /// Create a retry config
    pub fn new(max_tries: u32, factor: Duration, max_time: Duration) -> Self {
        Self {
            max_tries,
            factor,
            max_time,
        }
    }
}

/// A single failed attempt, as the policy sees it
#[derive(Debug)]
pub enum Failure<'a> {
    /// The server answered with a non-success status
    Status {
        status: u16,
        /// Parsed `Retry-After` header, in seconds
        retry_after: Option<f64>,
        body: &'a Value,
    },
    /// The request never produced a complete response
    Transport(&'a reqwest::Error),
}

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffDecision {
    /// Sleep for the given duration, then retry
    RetryAfter(Duration),
    /// Stop retrying and surface the failure
    GiveUp,
    /// Backoff cannot succeed; abort the stream
    Fatal(String),
}

/// Classification-driven exponential retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy with the default classifier
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(DefaultClassifier),
        }
    }

    /// Use a provider-specific error classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Get the error classifier
    pub fn classifier(&self) -> &dyn ErrorClassifier {
        self.classifier.as_ref()
    }

    /// Exponential wait for a zero-based attempt: `factor * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.config
            .factor
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Decide what to do after `attempt` (zero-based) failed.
    ///
    /// `waited` is the time already spent sleeping for this request.
    /// Returns `None` when the failure is outside the policy's classification;
    /// the caller must surface it unchanged.
    pub fn decide(
        &self,
        failure: &Failure<'_>,
        attempt: u32,
        waited: Duration,
    ) -> Option<BackoffDecision> {
        let wait = match failure {
            Failure::Status {
                status: 429,
                retry_after,
                ..
            } => match retry_after {
                Some(seconds) if *seconds >= self.config.max_time.as_secs_f64() => {
                    return Some(BackoffDecision::Fatal(format!(
                        "Retry-After of {seconds}s reaches the backoff limit of {}s",
                        self.config.max_time.as_secs()
                    )));
                }
                Some(seconds) if *seconds >= 0.0 => Duration::from_secs_f64(*seconds),
                _ => self.backoff(attempt),
            },
            Failure::Status { status, body, .. } if (400..500).contains(status) => {
                if self.classifier.is_limit_exceeded(*status, body) {
                    self.backoff(attempt)
                } else {
                    return Some(BackoffDecision::GiveUp);
                }
            }
            Failure::Status { status, .. } if *status >= 500 => self.backoff(attempt),
            Failure::Status { .. } => return Some(BackoffDecision::GiveUp),
            Failure::Transport(error) => {
                if is_transient(error) {
                    self.backoff(attempt)
                } else {
                    return None;
                }
            }
        };

        if attempt + 1 >= self.config.max_tries || waited.saturating_add(wait) > self.config.max_time
        {
            return Some(BackoffDecision::GiveUp);
        }

        Some(BackoffDecision::RetryAfter(wait))
    }
}

/// Timeouts, refused or dropped connections and truncated payloads
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout()
        || error.is_connect()
        || error.is_body()
        || error.is_decode()
        || (error.is_request() && !error.is_builder())
}
