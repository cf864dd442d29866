//! Client-side request pacing
//!
//! Two independent mechanisms:
//! - [`RateLimiter`]: a fixed token bucket using the governor crate.
//! - [`ResponseTimeTracker`]: adaptive throttling. Jamf Pro sends no
//!   rate-limit headers, so back-pressure is inferred from response times.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
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
        f.debug_struct("RateLimiter").finish()
    }
}

/// Upper bound on a single adaptive pause
pub const ADAPTIVE_DELAY_MAX: Duration = Duration::from_secs(5);

/// Exponential moving average of response times.
///
/// When a response takes more than twice the current average, the excess
/// over the average is returned as a pause for the caller to observe before
/// its next request.
#[derive(Debug)]
pub struct ResponseTimeTracker {
    alpha: f64,
    ema: Mutex<Option<Duration>>,
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl ResponseTimeTracker {
    /// Create a tracker with the given smoothing factor (0 < alpha < 1)
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            ema: Mutex::new(None),
        }
    }

    /// Record a sample and return the suggested pause
    pub fn record(&self, sample: Duration) -> Duration {
        let mut ema = self.ema.lock();
        let Some(prev) = *ema else {
            *ema = Some(sample);
            return Duration::ZERO;
        };

        let next = sample.as_secs_f64() * self.alpha + prev.as_secs_f64() * (1.0 - self.alpha);
        let next = Duration::from_secs_f64(next);
        *ema = Some(next);

        if sample <= next * 2 {
            return Duration::ZERO;
        }
        std::cmp::min(sample - next, ADAPTIVE_DELAY_MAX)
    }

    /// Current average, if any sample has been recorded
    pub fn average(&self) -> Option<Duration> {
        *self.ema.lock()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.burst_size, 10);
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(10, 5));

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
    }

    #[test]
    fn test_rate_limiter_zero_config_is_clamped() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(0, 0));
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(100, 10));
        limiter.wait().await;
    }

    #[test]
    fn test_tracker_first_sample_sets_baseline() {
        let tracker = ResponseTimeTracker::default();
        assert_eq!(tracker.record(Duration::from_millis(100)), Duration::ZERO);
        assert_eq!(tracker.average(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_tracker_steady_responses_need_no_pause() {
        let tracker = ResponseTimeTracker::default();
        for _ in 0..10 {
            assert_eq!(tracker.record(Duration::from_millis(100)), Duration::ZERO);
        }
    }

    #[test]
    fn test_tracker_slow_response_yields_excess() {
        let tracker = ResponseTimeTracker::default();
        tracker.record(Duration::from_millis(100));
        // ema = 0.2 * 1000 + 0.8 * 100 = 280ms; excess = 720ms
        let pause = tracker.record(Duration::from_millis(1000));
        assert!(pause > Duration::from_millis(700) && pause < Duration::from_millis(740));
    }

    #[test]
    fn test_tracker_pause_is_capped() {
        let tracker = ResponseTimeTracker::default();
        tracker.record(Duration::from_millis(10));
        let pause = tracker.record(Duration::from_secs(60));
        assert_eq!(pause, ADAPTIVE_DELAY_MAX);
    }
}
