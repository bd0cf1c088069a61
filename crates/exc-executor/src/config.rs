use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smart Order Executor configuration. Field names and defaults mirror the
/// top-level SOE configuration block exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoeConfig {
    pub unfill_timeout_ms: u64,
    /// Poll granularity reserved for a future push-based completion
    /// channel; this executor drives completion purely off the stall
    /// timer's refetch, so it is currently unused in the hot path.
    pub check_interval_ms: u64,
    pub max_resubmit_attempts: u32,
    pub price_slippage: Decimal,
    pub rate_limit_initial_wait_ms: u64,
    pub rate_limit_max_wait_ms: u64,
    pub rate_limit_backoff_multiplier: u32,
    pub max_concurrent_per_account: usize,
    pub max_concurrent_global: usize,
    pub queue_timeout_ms: u64,
    pub default_post_only: bool,
    pub auto_maker_price: bool,
    pub maker_price_offset: Decimal,
    pub dry_run: bool,
    pub dry_run_fill_delay_ms: u64,
    pub dry_run_slippage: Decimal,
    /// Dust tolerance used by the stall monitor's "filled>0 and remaining <
    /// 1% of requested" early-fill check.
    pub dust_tolerance: Decimal,
    /// Hard wall-clock ceiling on completion wait, regardless of other
    /// configured timeouts.
    pub completion_wait_ceiling_ms: u64,
    pub nonce_retry_delay_ms: u64,
    /// Bound on retries for Network/Exchange/Unknown errors.
    pub network_retry_cap: u32,
}

impl Default for SoeConfig {
    fn default() -> Self {
        Self {
            unfill_timeout_ms: 500,
            check_interval_ms: 100,
            max_resubmit_attempts: 5,
            price_slippage: dec!(0.001),
            rate_limit_initial_wait_ms: 1000,
            rate_limit_max_wait_ms: 30_000,
            rate_limit_backoff_multiplier: 2,
            max_concurrent_per_account: 5,
            max_concurrent_global: 20,
            queue_timeout_ms: 30_000,
            default_post_only: false,
            auto_maker_price: true,
            maker_price_offset: dec!(0.0001),
            dry_run: false,
            dry_run_fill_delay_ms: 100,
            dry_run_slippage: dec!(0.0001),
            dust_tolerance: dec!(0.01),
            completion_wait_ceiling_ms: 60_000,
            nonce_retry_delay_ms: 100,
            network_retry_cap: 5,
        }
    }
}

impl SoeConfig {
    pub fn unfill_timeout(&self) -> Duration {
        Duration::from_millis(self.unfill_timeout_ms)
    }

    pub fn completion_wait_ceiling(&self) -> Duration {
        Duration::from_millis(self.completion_wait_ceiling_ms)
    }

    pub fn nonce_retry_delay(&self) -> Duration {
        Duration::from_millis(self.nonce_retry_delay_ms)
    }

    pub fn dry_run_fill_delay(&self) -> Duration {
        Duration::from_millis(self.dry_run_fill_delay_ms)
    }
}
