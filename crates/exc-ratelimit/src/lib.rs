//! Rate-Limit Controller: per-endpoint exponential backoff window opened by
//! 429-class errors.
//!
//! Each endpoint owns a single backoff deadline that only 429-class
//! responses push forward, rather than counting messages in a sliding
//! window; the shape mirrors the reconnect/probe backoff pattern used for
//! endpoint health elsewhere in this workspace.

use std::time::Duration;

use dashmap::DashMap;
use exc_core::EndpointId;
use exc_telemetry::Metrics;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub base: Duration,
    pub multiplier: u32,
    pub cap: Duration,
    pub max_raises: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            multiplier: 2,
            cap: Duration::from_millis(30_000),
            max_raises: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    wait_until: Instant,
    consecutive_errors: u32,
}

/// Tracks one backoff window per endpoint.
///
/// `DashMap`'s sharded locking gives atomic read-modify-write per endpoint
/// without a separate lock type: `entry()` holds the shard lock for the
/// duration of the closure, so `record_limited` and `clear` never race with
/// each other on the same endpoint.
pub struct RateLimitController {
    config: RateLimitConfig,
    windows: DashMap<EndpointId, RateLimitWindow>,
}

impl RateLimitController {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn is_limited(&self, endpoint: &EndpointId) -> bool {
        self.windows
            .get(endpoint)
            .is_some_and(|w| w.wait_until > Instant::now())
    }

    /// Open or extend the backoff window: `waitUntil = now + min(base *
    /// multiplier^(n-1), cap)` where `n` is the number of consecutive
    /// errors, capped at `max_raises` so the exponent never overflows.
    pub fn record_limited(&self, endpoint: &EndpointId) {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(endpoint.clone())
            .or_insert(RateLimitWindow {
                wait_until: now,
                consecutive_errors: 0,
            });

        let n = (entry.consecutive_errors + 1).min(self.config.max_raises);
        entry.consecutive_errors = n;
        let backoff = self
            .config
            .base
            .saturating_mul(self.config.multiplier.saturating_pow(n - 1))
            .min(self.config.cap);
        entry.wait_until = now + backoff;
        debug!(endpoint = %endpoint, n, backoff_ms = backoff.as_millis() as u64, "rate limit window opened");
    }

    /// Reset the error streak on a successful call. Does not shorten an
    /// already-open `waitUntil`: a window that was honestly opened is
    /// honored to its end even after one success.
    pub fn clear(&self, endpoint: &EndpointId) {
        if let Some(mut window) = self.windows.get_mut(endpoint) {
            window.consecutive_errors = 0;
        }
    }

    /// Sleep until the endpoint's backoff window elapses, if any.
    pub async fn wait_if_limited(&self, endpoint: &EndpointId) {
        let deadline = self.windows.get(endpoint).map(|w| w.wait_until);
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if deadline > now {
                let wait = deadline - now;
                Metrics::rate_limit_wait(&endpoint.0, wait.as_secs_f64() * 1000.0);
                tokio::time::sleep_until(deadline).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RateLimitController {
        RateLimitController::new(RateLimitConfig {
            base: Duration::from_millis(100),
            multiplier: 2,
            cap: Duration::from_millis(1000),
            max_raises: 5,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_exponentially_until_cap() {
        let controller = controller();
        let endpoint = EndpointId::from("binance");

        controller.record_limited(&endpoint);
        assert!(controller.is_limited(&endpoint));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!controller.is_limited(&endpoint));

        controller.record_limited(&endpoint);
        controller.record_limited(&endpoint);
        // third consecutive error -> 100 * 2^2 = 400ms
        tokio::time::advance(Duration::from_millis(399)).await;
        assert!(controller.is_limited(&endpoint));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!controller.is_limited(&endpoint));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_resets_streak_but_not_wait_until() {
        let controller = controller();
        let endpoint = EndpointId::from("binance");

        controller.record_limited(&endpoint);
        assert!(controller.is_limited(&endpoint));

        controller.clear(&endpoint);
        // waitUntil is untouched: still limited until the window elapses.
        assert!(controller.is_limited(&endpoint));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!controller.is_limited(&endpoint));

        // streak was reset, so the next error restarts at n=1.
        controller.record_limited(&endpoint);
        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(controller.is_limited(&endpoint));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!controller.is_limited(&endpoint));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_if_limited_sleeps_until_window_elapses() {
        let controller = controller();
        let endpoint = EndpointId::from("binance");
        controller.record_limited(&endpoint);

        let start = Instant::now();
        controller.wait_if_limited(&endpoint).await;
        assert!(Instant::now() - start >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_are_independent() {
        let controller = controller();
        controller.record_limited(&EndpointId::from("a"));
        assert!(controller.is_limited(&EndpointId::from("a")));
        assert!(!controller.is_limited(&EndpointId::from("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn raises_saturate_at_max_raises() {
        let controller = controller();
        let endpoint = EndpointId::from("binance");
        for _ in 0..10 {
            controller.record_limited(&endpoint);
            tokio::time::advance(Duration::from_millis(1000)).await;
        }
        // at max_raises=5, backoff = 100 * 2^4 = 1600ms, capped to 1000ms
        controller.record_limited(&endpoint);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(controller.is_limited(&endpoint));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!controller.is_limited(&endpoint));
    }
}
