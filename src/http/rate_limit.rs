//! Client-side request quota
//!
//! Uses the governor crate for token bucket rate limiting. Providers publish
//! their quotas in different units (Mixpanel counts requests per hour, most
//! others per second), so the quota carries its own period.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Period a request quota is counted over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    #[default]
    Second,
    Minute,
    Hour,
}

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per period
    pub requests: u32,
    /// Period the requests are counted over
    pub period: QuotaPeriod,
    /// Burst size (max tokens in bucket); defaults to 1 for hourly quotas
    pub burst_size: Option<u32>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(10)
    }
}

impl RateLimiterConfig {
    /// Quota counted per second
    pub fn per_second(requests: u32) -> Self {
        Self {
            requests,
            period: QuotaPeriod::Second,
            burst_size: None,
        }
    }

    /// Quota counted per minute
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            period: QuotaPeriod::Minute,
            burst_size: None,
        }
    }

    /// Quota counted per hour
    pub fn per_hour(requests: u32) -> Self {
        Self {
            requests,
            period: QuotaPeriod::Hour,
            burst_size: None,
        }
    }

    /// Override the burst size
    #[must_use]
    pub fn burst(mut self, burst_size: u32) -> Self {
        self.burst_size = Some(burst_size);
        self
    }

    fn quota(&self) -> Quota {
        let requests = NonZeroU32::new(self.requests).unwrap_or(NonZeroU32::MIN);
        let quota = match self.period {
            QuotaPeriod::Second => Quota::per_second(requests),
            QuotaPeriod::Minute => Quota::per_minute(requests),
            // Spread hourly quotas evenly instead of letting the whole hour burst
            QuotaPeriod::Hour => Quota::per_hour(requests).allow_burst(NonZeroU32::MIN),
        };

        match self.burst_size.and_then(NonZeroU32::new) {
            Some(burst) => quota.allow_burst(burst),
            None => quota,
        }
    }

    /// Interval between replenished permits
    pub fn replenish_interval(&self) -> Duration {
        self.quota().replenish_interval()
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            config: config.clone(),
            limiter: Arc::new(Governor::direct(config.quota())),
        }
    }

    /// Get the configured quota
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests, 10);
        assert_eq!(config.period, QuotaPeriod::Second);
        assert_eq!(config.burst_size, None);
    }

    #[test]
    fn test_hourly_quota_interval() {
        let config = RateLimiterConfig::per_hour(60);
        assert_eq!(config.replenish_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_period_serde() {
        let period: QuotaPeriod = serde_json::from_str("\"hour\"").unwrap();
        assert_eq!(period, QuotaPeriod::Hour);
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_second(10).burst(5));

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_hourly_quota_allows_one_then_blocks() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_hour(400));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_second(100));
        limiter.wait().await;
    }
}
