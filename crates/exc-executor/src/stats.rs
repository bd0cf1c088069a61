use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Stats {
    submitted: AtomicU64,
    filled: AtomicU64,
    canceled: AtomicU64,
    failed: AtomicU64,
    resubmits: AtomicU64,
    rate_limit_hits: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub filled: u64,
    pub canceled: u64,
    pub failed: u64,
    pub resubmits: u64,
    pub rate_limit_hits: u64,
}

impl Stats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filled(&self) {
        self.filled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resubmit(&self) {
        self.resubmits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            filled: self.filled.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            resubmits: self.resubmits.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
        }
    }
}
