use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use exc_core::{EndpointId, ExchangeAdapter, OpenOrder, PositionSnapshot, Symbol};
use exc_executor::EndpointSelector;
use exc_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::EfcConfig;
use crate::events::{FailoverEvent, FailoverReason};
use crate::health::{EndpointHealth, EndpointStatus};

struct Registration {
    adapter: Arc<dyn ExchangeAdapter>,
    priority: u32,
}

/// Probes registered endpoints, tracks rolling health, and elects a primary.
/// Implements `EndpointSelector` so a `SmartOrderExecutor` can be driven
/// directly by failover state without either crate depending on the other's
/// internals.
pub struct FailoverController {
    config: EfcConfig,
    endpoints: DashMap<EndpointId, Registration>,
    health: DashMap<EndpointId, EndpointHealth>,
    primary: RwLock<Option<EndpointId>>,
    last_failover_at: AtomicI64,
    recovery_target: Mutex<Option<EndpointId>>,
    events: exc_core::EventBus<FailoverEvent>,
    stopped: AtomicBool,
}

impl FailoverController {
    #[must_use]
    pub fn new(config: EfcConfig) -> Self {
        Self {
            config,
            endpoints: DashMap::new(),
            health: DashMap::new(),
            primary: RwLock::new(None),
            last_failover_at: AtomicI64::new(i64::MIN),
            recovery_target: Mutex::new(None),
            events: exc_core::EventBus::new(),
            stopped: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FailoverEvent> {
        self.events.subscribe()
    }

    /// Register an endpoint. The first registrant, or any registrant passing
    /// `is_primary = true`, becomes primary immediately.
    pub fn register(&self, id: EndpointId, adapter: Arc<dyn ExchangeAdapter>, priority: u32, is_primary: bool) {
        self.health.insert(id.clone(), EndpointHealth::new(priority, self.config.latency_window_size));
        self.endpoints.insert(id.clone(), Registration { adapter, priority });

        let mut primary = self.primary.write();
        if is_primary || primary.is_none() {
            *primary = Some(id);
        }
    }

    #[must_use]
    pub fn health_of(&self, id: &EndpointId) -> Option<EndpointHealth> {
        self.health.get(id).map(|h| h.clone())
    }

    #[must_use]
    pub fn current_primary(&self) -> Option<EndpointId> {
        self.primary.read().clone()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Probe every registered endpoint concurrently, update health, then run
    /// primary election. Returns the number of endpoints probed.
    pub async fn probe_once(&self) -> usize {
        let targets: Vec<(EndpointId, Arc<dyn ExchangeAdapter>)> = self
            .endpoints
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(&e.value().adapter)))
            .collect();

        let timeout = self.config.health_check_timeout();
        let probes = targets.into_iter().map(|(id, adapter)| async move {
            let started = Instant::now();
            let result = tokio::time::timeout(timeout, adapter.fetch_time()).await;
            (id, result, started.elapsed())
        });
        let results = futures_util::future::join_all(probes).await;
        let probed = results.len();

        for (id, result, elapsed) in results {
            let latency_ms = elapsed.as_millis() as u64;
            let now = Utc::now();
            Metrics::probe_latency(&id.0, latency_ms as f64);
            if let Some(mut health) = self.health.get_mut(&id) {
                match result {
                    Ok(Ok(_)) => {
                        health.record_success(latency_ms, self.config.latency_warning_threshold_ms, now);
                    }
                    Ok(Err(e)) => {
                        health.record_failure(e.message, self.config.failure_threshold, now);
                        warn!(endpoint = %id, "probe failed");
                    }
                    Err(_) => {
                        health.record_failure("probe timed out", self.config.failure_threshold, now);
                        warn!(endpoint = %id, "probe timed out");
                    }
                }
                Metrics::endpoint_healthy(&id.0, matches!(health.status, EndpointStatus::Healthy));
            }
        }

        self.run_election();
        probed
    }

    /// Background probe loop: fires every `health_check_interval` until
    /// `stop()` is called.
    pub async fn run_probe_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.health_check_interval());
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            self.probe_once().await;
        }
    }

    /// If the current primary is down and the cooldown has elapsed, promote
    /// the lowest-priority healthy candidate. Emits `NoBackupAvailable` if
    /// none exists.
    fn run_election(&self) {
        if !self.config.enable_auto_failover {
            return;
        }

        let current = self.primary.read().clone();
        let Some(current_id) = current else { return };

        let current_unhealthy = self
            .health
            .get(&current_id)
            .map(|h| matches!(h.status, EndpointStatus::Unhealthy | EndpointStatus::Offline))
            .unwrap_or(false);
        if !current_unhealthy {
            return;
        }

        let last = self.last_failover_at.load(Ordering::SeqCst);
        if Self::now_ms() - last < self.config.failover_cooldown_ms {
            return;
        }

        let candidate = self
            .health
            .iter()
            .filter(|e| *e.key() != current_id && e.value().is_candidate_for_primary())
            .min_by_key(|e| e.value().priority)
            .map(|e| e.key().clone());

        match candidate {
            Some(new_primary) => {
                self.promote(new_primary, FailoverReason::Unhealthy, Some(current_id));
            }
            None => {
                warn!("no backup endpoint available for failover");
                Metrics::failover("no_backup_available");
                self.events.emit(FailoverEvent::NoBackupAvailable { timestamp: Utc::now() });
            }
        }
    }

    fn promote(&self, new_primary: EndpointId, reason: FailoverReason, previous: Option<EndpointId>) {
        *self.primary.write() = Some(new_primary.clone());
        self.last_failover_at.store(Self::now_ms(), Ordering::SeqCst);
        info!(from = ?previous, to = %new_primary, ?reason, "primary endpoint changed");
        Metrics::failover(match reason {
            FailoverReason::Unhealthy => "unhealthy",
            FailoverReason::Recovered => "recovered",
            FailoverReason::Manual => "manual",
        });
        self.events.emit(FailoverEvent::Failover {
            from: previous,
            to: new_primary,
            reason,
            timestamp: Utc::now(),
        });
    }

    /// Unconditional manual promotion, bypassing health checks and cooldown.
    pub fn switch_to(&self, id: EndpointId) {
        let previous = self.primary.read().clone();
        self.promote(id, FailoverReason::Manual, previous);
    }

    /// Call once after a health-driven failover to arm auto-recovery for the
    /// endpoint that was demoted. Spawns a one-shot timer; on fire, promotes
    /// the original endpoint back if it has recovered and is strictly
    /// higher-priority (lower number) than the current primary, otherwise
    /// reschedules.
    pub fn arm_auto_recovery(self: &Arc<Self>, original: EndpointId) {
        if !self.config.enable_auto_recovery {
            return;
        }
        *self.recovery_target.lock() = Some(original.clone());
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.recovery_cycle(original).await;
        });
    }

    async fn recovery_cycle(self: Arc<Self>, original: EndpointId) {
        loop {
            tokio::time::sleep(self.config.recovery_wait_time()).await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            if self.recovery_target.lock().as_ref() != Some(&original) {
                return; // superseded by a newer failover or manual switch
            }

            let recovered = self.health.get(&original).map(|h| {
                h.status == EndpointStatus::Healthy && h.consecutive_successes >= self.config.recovery_threshold
            });
            let Some(true) = recovered else {
                continue; // not yet recovered, reschedule
            };

            let original_priority = self.endpoints.get(&original).map(|e| e.priority);
            let current_priority = self
                .primary
                .read()
                .clone()
                .and_then(|id| self.endpoints.get(&id).map(|e| e.priority));

            match (original_priority, current_priority) {
                (Some(orig), Some(curr)) if orig < curr => {
                    let previous = self.primary.read().clone();
                    self.promote(original.clone(), FailoverReason::Recovered, previous);
                    *self.recovery_target.lock() = None;
                    return;
                }
                _ => continue,
            }
        }
    }

    pub async fn fetch_open_orders(&self, id: &EndpointId, symbol: Option<&Symbol>) -> Result<Vec<OpenOrder>, exc_core::AdapterError> {
        let adapter = self.endpoints.get(id).map(|e| Arc::clone(&e.adapter));
        match adapter {
            Some(a) => a.fetch_open_orders(symbol).await,
            None => Err(exc_core::AdapterError::new("endpoint not registered")),
        }
    }

    pub async fn fetch_positions(&self, id: &EndpointId) -> Result<Vec<PositionSnapshot>, exc_core::AdapterError> {
        let adapter = self.endpoints.get(id).map(|e| Arc::clone(&e.adapter));
        match adapter {
            Some(a) => a.fetch_positions().await,
            None => Err(exc_core::AdapterError::new("endpoint not registered")),
        }
    }

    pub async fn fetch_balance(&self, id: &EndpointId) -> Result<Vec<exc_core::BalanceSnapshot>, exc_core::AdapterError> {
        let adapter = self.endpoints.get(id).map(|e| Arc::clone(&e.adapter));
        match adapter {
            Some(a) => a.fetch_balance().await,
            None => Err(exc_core::AdapterError::new("endpoint not registered")),
        }
    }

    pub fn adapter_for(&self, id: &EndpointId) -> Option<Arc<dyn ExchangeAdapter>> {
        self.endpoints.get(id).map(|e| Arc::clone(&e.adapter))
    }
}

impl EndpointSelector for FailoverController {
    fn primary(&self) -> Option<EndpointId> {
        self.primary.read().clone()
    }

    fn next_healthy(&self, exclude: &[EndpointId]) -> Option<EndpointId> {
        self.health
            .iter()
            .filter(|e| !exclude.contains(e.key()) && e.value().is_candidate_for_primary())
            .min_by_key(|e| e.value().priority)
            .map(|e| e.key().clone())
    }
}
