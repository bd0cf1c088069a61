use std::path::Path;
use std::time::Duration;

use exc_account::AccountLockConfig;
use exc_failover::EfcConfig;
use exc_quality::EqmConfig;
use exc_ratelimit::RateLimitConfig;
use exc_reconciler::SrConfig;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// One registered exchange endpoint. `priority` breaks ties during
/// failover election; lower is preferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub id: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub is_primary: bool,
}

fn default_account_lock_max_concurrent_global() -> usize {
    20
}

fn default_account_lock_task_timeout_ms() -> u64 {
    30_000
}

fn default_account_lock_idle_reap_after_ms() -> u64 {
    300_000
}

fn default_rate_limit_base_ms() -> u64 {
    1_000
}

fn default_rate_limit_multiplier() -> u32 {
    2
}

fn default_rate_limit_cap_ms() -> u64 {
    30_000
}

fn default_rate_limit_max_raises() -> u32 {
    5
}

/// Top-level engine configuration: one block per wired component plus the
/// endpoint registry. Component blocks use each component's own defaults
/// when omitted from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub soe: exc_executor::SoeConfig,
    pub efc: EfcConfig,
    pub sr: SrConfig,
    pub eqm: EqmConfig,

    #[serde(default = "default_account_lock_max_concurrent_global")]
    pub account_lock_max_concurrent_global: usize,
    #[serde(default = "default_account_lock_task_timeout_ms")]
    pub account_lock_task_timeout_ms: u64,
    #[serde(default = "default_account_lock_idle_reap_after_ms")]
    pub account_lock_idle_reap_after_ms: u64,

    #[serde(default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,
    #[serde(default = "default_rate_limit_multiplier")]
    pub rate_limit_multiplier: u32,
    #[serde(default = "default_rate_limit_cap_ms")]
    pub rate_limit_cap_ms: u64,
    #[serde(default = "default_rate_limit_max_raises")]
    pub rate_limit_max_raises: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            soe: exc_executor::SoeConfig::default(),
            efc: EfcConfig::default(),
            sr: SrConfig::default(),
            eqm: EqmConfig::default(),
            account_lock_max_concurrent_global: default_account_lock_max_concurrent_global(),
            account_lock_task_timeout_ms: default_account_lock_task_timeout_ms(),
            account_lock_idle_reap_after_ms: default_account_lock_idle_reap_after_ms(),
            rate_limit_base_ms: default_rate_limit_base_ms(),
            rate_limit_multiplier: default_rate_limit_multiplier(),
            rate_limit_cap_ms: default_rate_limit_cap_ms(),
            rate_limit_max_raises: default_rate_limit_max_raises(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(EngineError::ConfigRead)?;
        toml::from_str(&content).map_err(EngineError::ConfigParse)
    }

    pub fn account_lock_config(&self) -> AccountLockConfig {
        AccountLockConfig {
            max_concurrent_global: self.account_lock_max_concurrent_global,
            task_timeout: Duration::from_millis(self.account_lock_task_timeout_ms),
            idle_reap_after: Duration::from_millis(self.account_lock_idle_reap_after_ms),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            base: Duration::from_millis(self.rate_limit_base_ms),
            multiplier: self.rate_limit_multiplier,
            cap: Duration::from_millis(self.rate_limit_cap_ms),
            max_raises: self.rate_limit_max_raises,
        }
    }
}
