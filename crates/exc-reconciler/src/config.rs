use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tunables for the sync loops, diff tolerances, and repair policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SrConfig {
    pub sync_check_interval_ms: u64,
    pub force_full_sync_interval_ms: u64,
    pub sync_timeout_ms: u64,
    pub position_size_tolerance: Decimal,
    pub balance_tolerance: Decimal,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub partition_threshold: u32,
    pub enable_auto_repair: bool,
    pub confirm_before_repair: bool,
    pub max_repair_attempts: u32,
    pub history_length: usize,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            sync_check_interval_ms: 30_000,
            force_full_sync_interval_ms: 300_000,
            sync_timeout_ms: 10_000,
            position_size_tolerance: dec!(0.001),
            balance_tolerance: dec!(0.0001),
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 15_000,
            partition_threshold: 3,
            enable_auto_repair: true,
            confirm_before_repair: true,
            max_repair_attempts: 3,
            history_length: 500,
        }
    }
}

impl SrConfig {
    pub fn sync_check_interval(&self) -> Duration {
        Duration::from_millis(self.sync_check_interval_ms)
    }

    pub fn force_full_sync_interval(&self) -> Duration {
        Duration::from_millis(self.force_full_sync_interval_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}
