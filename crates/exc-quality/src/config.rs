use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tunables for quality bucket thresholds, rolling windows, and anomaly
/// detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EqmConfig {
    pub slippage_warning_threshold: Decimal,
    pub slippage_critical_threshold: Decimal,
    pub slippage_anomaly_threshold: Decimal,
    pub execution_time_warning_ms: u64,
    pub execution_time_critical_ms: u64,
    pub execution_time_anomaly_ms: u64,
    pub fill_rate_warning: Decimal,
    pub fill_rate_critical: Decimal,
    pub statistics_window_size: usize,
    pub rolling_window_time_ms: u64,
    pub short_term_window_time_ms: u64,
    pub aggregation_interval_ms: u64,
    pub enable_anomaly_detection: bool,
    pub anomaly_sensitivity: f64,
}

impl Default for EqmConfig {
    fn default() -> Self {
        Self {
            slippage_warning_threshold: dec!(0.002),
            slippage_critical_threshold: dec!(0.005),
            slippage_anomaly_threshold: dec!(0.01),
            execution_time_warning_ms: 5_000,
            execution_time_critical_ms: 15_000,
            execution_time_anomaly_ms: 60_000,
            fill_rate_warning: dec!(0.8),
            fill_rate_critical: dec!(0.5),
            statistics_window_size: 1_000,
            rolling_window_time_ms: 86_400_000,
            short_term_window_time_ms: 3_600_000,
            aggregation_interval_ms: 60_000,
            enable_anomaly_detection: true,
            anomaly_sensitivity: 3.0,
        }
    }
}

impl EqmConfig {
    pub fn rolling_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.rolling_window_time_ms as i64)
    }

    pub fn short_term_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.short_term_window_time_ms as i64)
    }

    pub fn aggregation_interval(&self) -> Duration {
        Duration::from_millis(self.aggregation_interval_ms)
    }
}
