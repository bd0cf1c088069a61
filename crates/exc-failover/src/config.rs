use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the probe loop, health classification, and failover policy.
/// Defaults match a conservative production posture: probe every 10 s,
/// tolerate 3 consecutive failures before declaring an endpoint offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EfcConfig {
    pub health_check_interval_ms: u64,
    pub health_check_timeout_ms: u64,
    pub failure_threshold: u32,
    pub recovery_threshold: u32,
    pub latency_warning_threshold_ms: u64,
    pub latency_critical_threshold_ms: u64,
    pub latency_window_size: usize,
    pub enable_auto_failover: bool,
    pub failover_cooldown_ms: i64,
    pub enable_auto_recovery: bool,
    pub recovery_wait_time_ms: u64,
}

impl Default for EfcConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 10_000,
            health_check_timeout_ms: 5_000,
            failure_threshold: 3,
            recovery_threshold: 3,
            latency_warning_threshold_ms: 500,
            latency_critical_threshold_ms: 2_000,
            latency_window_size: 20,
            enable_auto_failover: true,
            failover_cooldown_ms: 60_000,
            enable_auto_recovery: true,
            recovery_wait_time_ms: 300_000,
        }
    }
}

impl EfcConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn recovery_wait_time(&self) -> Duration {
        Duration::from_millis(self.recovery_wait_time_ms)
    }
}
