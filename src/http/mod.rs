//! HTTP client module
//!
//! Provides the HTTP transport with retry, rate limiting, and error
//! classification.
//!
//! # Features
//!
//! - **Retry Policy**: exponential `factor * 2^attempt` waits, no jitter
//! - **Error Classification**: provider limit codes inside 4xx bodies
//! - **Rate Limiting**: token bucket quotas per second, minute or hour
//! - **Authentication**: credentials applied through an [`AuthProvider`](crate::auth::AuthProvider)

mod classify;
mod client;
mod rate_limit;
mod retry;

pub use classify::{error_message, DefaultClassifier, ErrorClassifier, ErrorCodeClassifier};
pub use client::{ApiResponse, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{QuotaPeriod, RateLimiter, RateLimiterConfig};
pub use retry::{BackoffDecision, Failure, RetryConfig, RetryPolicy};
