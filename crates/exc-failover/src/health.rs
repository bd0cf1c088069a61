use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Health classification for a registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
    Unknown,
}

/// Per-endpoint probe history and derived status. Priority is fixed at
/// registration and never mutated afterward.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub status: EndpointStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    latency_window: VecDeque<u64>,
    window_size: usize,
    pub priority: u32,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl EndpointHealth {
    pub fn new(priority: u32, window_size: usize) -> Self {
        Self {
            status: EndpointStatus::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            latency_window: VecDeque::with_capacity(window_size),
            window_size,
            priority,
            last_probe_at: None,
            last_error: None,
        }
    }

    /// Average latency over the ring buffer, `None` if no probes recorded.
    pub fn avg_latency_ms(&self) -> Option<u64> {
        if self.latency_window.is_empty() {
            return None;
        }
        let sum: u64 = self.latency_window.iter().sum();
        Some(sum / self.latency_window.len() as u64)
    }

    pub fn is_candidate_for_primary(&self) -> bool {
        !matches!(self.status, EndpointStatus::Unhealthy | EndpointStatus::Offline)
    }

    fn push_latency(&mut self, latency_ms: u64) {
        if self.latency_window.len() >= self.window_size {
            self.latency_window.pop_front();
        }
        self.latency_window.push_back(latency_ms);
    }

    /// Record a successful probe. Status becomes `Healthy` if the rolling
    /// average latency stays under `warn_ms`, else `Degraded`.
    pub fn record_success(&mut self, latency_ms: u64, warn_ms: u64, now: DateTime<Utc>) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.push_latency(latency_ms);
        self.last_probe_at = Some(now);
        self.last_error = None;

        self.status = match self.avg_latency_ms() {
            Some(avg) if avg < warn_ms => EndpointStatus::Healthy,
            _ => EndpointStatus::Degraded,
        };
    }

    /// Record a failed probe. Status becomes `Unhealthy` on the first
    /// failure, `Offline` once `consecutive_failures >= failure_threshold`.
    pub fn record_failure(&mut self, error: impl Into<String>, failure_threshold: u32, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_probe_at = Some(now);
        self.last_error = Some(error.into());

        self.status = if self.consecutive_failures >= failure_threshold {
            EndpointStatus::Offline
        } else {
            EndpointStatus::Unhealthy
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_endpoint_is_unknown() {
        let health = EndpointHealth::new(0, 20);
        assert_eq!(health.status, EndpointStatus::Unknown);
        assert_eq!(health.avg_latency_ms(), None);
    }

    #[test]
    fn success_under_warn_threshold_is_healthy() {
        let mut health = EndpointHealth::new(0, 20);
        health.record_success(100, 500, Utc::now());
        assert_eq!(health.status, EndpointStatus::Healthy);
        assert_eq!(health.consecutive_successes, 1);
    }

    #[test]
    fn success_over_warn_threshold_is_degraded() {
        let mut health = EndpointHealth::new(0, 20);
        health.record_success(800, 500, Utc::now());
        assert_eq!(health.status, EndpointStatus::Degraded);
    }

    #[test]
    fn first_failure_is_unhealthy_not_offline() {
        let mut health = EndpointHealth::new(0, 20);
        health.record_failure("timeout", 3, Utc::now());
        assert_eq!(health.status, EndpointStatus::Unhealthy);
        assert_eq!(health.consecutive_failures, 1);
    }

    #[test]
    fn offline_after_failure_threshold() {
        let mut health = EndpointHealth::new(0, 20);
        for _ in 0..3 {
            health.record_failure("timeout", 3, Utc::now());
        }
        assert_eq!(health.status, EndpointStatus::Offline);
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut health = EndpointHealth::new(0, 20);
        health.record_failure("timeout", 3, Utc::now());
        health.record_failure("timeout", 3, Utc::now());
        health.record_success(100, 500, Utc::now());
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.status, EndpointStatus::Healthy);
    }

    #[test]
    fn latency_window_evicts_oldest() {
        let mut health = EndpointHealth::new(0, 3);
        health.record_success(100, 5000, Utc::now());
        health.record_success(200, 5000, Utc::now());
        health.record_success(300, 5000, Utc::now());
        health.record_success(400, 5000, Utc::now());
        // window now holds [200, 300, 400]
        assert_eq!(health.avg_latency_ms(), Some(300));
    }

    #[test]
    fn candidacy_excludes_unhealthy_and_offline() {
        let mut health = EndpointHealth::new(0, 20);
        assert!(health.is_candidate_for_primary());
        health.record_failure("e", 3, Utc::now());
        assert!(!health.is_candidate_for_primary());
    }
}
