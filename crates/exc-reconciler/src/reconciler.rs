use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use exc_core::{EndpointId, EventBus, ExchangeAdapter, RemoteId, Symbol};
use exc_telemetry::Metrics;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::SrConfig;
use crate::diff::{diff_balances, diff_orders, diff_positions, Inconsistency, Severity};
use crate::events::SrEvent;
use crate::partition::{HeartbeatTracker, PartitionState};
use crate::repair::{action_for, RepairAction, RepairHistory, RepairOutcome};
use crate::view::{BalanceView, Ledger, OrderView, PositionView};

fn inconsistency_kind(inconsistency: &Inconsistency) -> &'static str {
    match inconsistency {
        Inconsistency::OrderMissing { .. } => "order_missing",
        Inconsistency::OrderExtra { .. } => "order_extra",
        Inconsistency::OrderStatusDiff { .. } => "order_status_diff",
        Inconsistency::PositionMissing { .. } => "position_missing",
        Inconsistency::PositionExtra { .. } => "position_extra",
        Inconsistency::PositionSizeDiff { .. } => "position_size_diff",
        Inconsistency::BalanceMismatch { .. } => "balance_mismatch",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn action_label(action: &RepairAction) -> &'static str {
    match action {
        RepairAction::SyncOrder => "sync_order",
        RepairAction::SyncPosition { .. } => "sync_position",
        RepairAction::SyncBalance => "sync_balance",
        RepairAction::FetchFills => "fetch_fills",
        RepairAction::CancelOrder => "cancel_order",
        RepairAction::NoAction => "no_action",
    }
}

fn partition_state_label(state: PartitionState) -> &'static str {
    match state {
        PartitionState::Connected => "connected",
        PartitionState::Partial => "partial",
        PartitionState::Partitioned => "partitioned",
        PartitionState::Reconnecting => "reconnecting",
    }
}

fn describe(inconsistency: &Inconsistency) -> String {
    match inconsistency {
        Inconsistency::OrderMissing { remote_id } => format!("order {remote_id} missing locally"),
        Inconsistency::OrderExtra { remote_id } => format!("order {remote_id} exists remotely only"),
        Inconsistency::OrderStatusDiff { remote_id, .. } => format!("order {remote_id} status/fill diverged"),
        Inconsistency::PositionMissing { symbol } => format!("position {symbol} missing locally"),
        Inconsistency::PositionExtra { symbol } => format!("position {symbol} exists remotely only"),
        Inconsistency::PositionSizeDiff { symbol, .. } => format!("position {symbol} size diverged"),
        Inconsistency::BalanceMismatch { currency, .. } => format!("balance {currency} diverged"),
    }
}

fn inconsistency_key(inconsistency: &Inconsistency) -> String {
    match inconsistency {
        Inconsistency::OrderMissing { remote_id } | Inconsistency::OrderExtra { remote_id } => {
            format!("order:{remote_id}")
        }
        Inconsistency::OrderStatusDiff { remote_id, .. } => format!("order-diff:{remote_id}"),
        Inconsistency::PositionMissing { symbol }
        | Inconsistency::PositionExtra { symbol }
        | Inconsistency::PositionSizeDiff { symbol, .. } => format!("position:{symbol}"),
        Inconsistency::BalanceMismatch { currency, .. } => format!("balance:{currency}"),
    }
}

/// Diffs locally maintained order/position/balance views against the
/// authoritative endpoint, emits detected inconsistencies, and applies
/// bounded automatic repair. Local state is pushed in by the executor via
/// `update_local_*`; remote state is refreshed by the sync loops.
pub struct StateReconciler {
    config: SrConfig,
    adapters: DashMap<EndpointId, Arc<dyn ExchangeAdapter>>,
    local: Ledger,
    remote: Ledger,
    heartbeat: Mutex<HeartbeatTracker>,
    repair_attempts: DashMap<String, u32>,
    repair_history: Mutex<RepairHistory>,
    events: EventBus<SrEvent>,
    stopped: AtomicBool,
}

impl StateReconciler {
    #[must_use]
    pub fn new(config: SrConfig) -> Self {
        let heartbeat = Mutex::new(HeartbeatTracker::new(config.partition_threshold));
        let history = Mutex::new(RepairHistory::new(config.history_length));
        Self {
            config,
            adapters: DashMap::new(),
            local: Ledger::new(),
            remote: Ledger::new(),
            heartbeat,
            repair_attempts: DashMap::new(),
            repair_history: history,
            events: EventBus::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn register_adapter(&self, endpoint_id: EndpointId, adapter: Arc<dyn ExchangeAdapter>) {
        self.adapters.insert(endpoint_id, adapter);
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SrEvent> {
        self.events.subscribe()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Background sync loop for one endpoint: quick sync on
    /// `sync_check_interval`, upgraded to a full sync every
    /// `force_full_sync_interval` ticks, until `stop()` is called.
    pub async fn run_sync_loop(self: Arc<Self>, endpoint_id: EndpointId) {
        let mut ticker = tokio::time::interval(self.config.sync_check_interval());
        let full_sync_every = (self.config.force_full_sync_interval_ms / self.config.sync_check_interval_ms).max(1);
        self.full_sync(&endpoint_id).await;
        let mut ticks: u64 = 0;
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            ticks += 1;
            if ticks % full_sync_every == 0 {
                self.full_sync(&endpoint_id).await;
            } else {
                self.quick_sync(&endpoint_id).await;
            }
        }
    }

    /// Background heartbeat loop for one endpoint: fires every
    /// `heartbeat_interval` until `stop()` is called.
    pub async fn run_heartbeat_loop(self: Arc<Self>, endpoint_id: EndpointId) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval());
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            self.heartbeat(&endpoint_id).await;
        }
    }

    #[must_use]
    pub fn partition_state(&self) -> PartitionState {
        self.heartbeat.lock().state()
    }

    #[must_use]
    pub fn repair_history(&self) -> Vec<RepairOutcome> {
        self.repair_history.lock().snapshot()
    }

    pub fn update_local_order(&self, remote_id: RemoteId, view: OrderView) {
        self.local.orders.insert(remote_id, view);
    }

    pub fn remove_local_order(&self, remote_id: &RemoteId) {
        self.local.orders.remove(remote_id);
    }

    pub fn update_local_position(&self, symbol: Symbol, view: PositionView) {
        self.local.positions.insert(symbol, view);
    }

    pub fn update_local_balance(&self, currency: exc_core::Currency, view: BalanceView) {
        self.local.balances.insert(currency, view);
    }

    fn adapter_for(&self, endpoint_id: &EndpointId) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.get(endpoint_id).map(|a| Arc::clone(a.value()))
    }

    /// Re-fetch open orders only, update the remote order view, run the
    /// order diff, and repair. Suppressed while partitioned.
    pub async fn quick_sync(&self, endpoint_id: &EndpointId) {
        if matches!(self.partition_state(), PartitionState::Partitioned) {
            return;
        }
        let Some(adapter) = self.adapter_for(endpoint_id) else {
            warn!(%endpoint_id, "quick sync skipped: no adapter registered");
            return;
        };

        match tokio::time::timeout(self.config.sync_timeout(), adapter.fetch_open_orders(None)).await {
            Ok(Ok(orders)) => {
                let now = Utc::now();
                self.remote.replace_orders(orders.into_iter().map(|o| {
                    (
                        o.remote_id.clone(),
                        OrderView {
                            symbol: o.symbol,
                            side: o.side,
                            price: o.price,
                            amount: o.amount,
                            filled: o.filled,
                            remaining: o.remaining,
                            status: o.status,
                            updated_at: now,
                        },
                    )
                }));
                self.remote.mark_synced(now);
                self.diff_and_repair_orders().await;
            }
            Ok(Err(e)) => warn!(%endpoint_id, error = %e, "quick sync fetch_open_orders failed"),
            Err(_) => warn!(%endpoint_id, "quick sync timed out"),
        }
    }

    /// Re-fetch open orders, positions, and balances in parallel, then run
    /// the full diff across all three.
    pub async fn full_sync(&self, endpoint_id: &EndpointId) {
        let Some(adapter) = self.adapter_for(endpoint_id) else {
            warn!(%endpoint_id, "full sync skipped: no adapter registered");
            return;
        };

        let timeout = self.config.sync_timeout();
        let (orders, positions, balances) = tokio::join!(
            tokio::time::timeout(timeout, adapter.fetch_open_orders(None)),
            tokio::time::timeout(timeout, adapter.fetch_positions()),
            tokio::time::timeout(timeout, adapter.fetch_balance()),
        );

        let now = Utc::now();
        if let Ok(Ok(orders)) = orders {
            self.remote.replace_orders(orders.into_iter().map(|o| {
                (
                    o.remote_id.clone(),
                    OrderView {
                        symbol: o.symbol,
                        side: o.side,
                        price: o.price,
                        amount: o.amount,
                        filled: o.filled,
                        remaining: o.remaining,
                        status: o.status,
                        updated_at: now,
                    },
                )
            }));
        } else {
            warn!(%endpoint_id, "full sync fetch_open_orders failed or timed out");
        }

        if let Ok(Ok(positions)) = positions {
            self.remote.replace_positions(positions.into_iter().map(|p| {
                (
                    p.symbol,
                    PositionView {
                        side: p.side,
                        size: p.size,
                        entry_price: p.entry_price,
                        mark_price: p.mark_price,
                        unrealized_pnl: p.unrealized_pnl,
                        updated_at: now,
                    },
                )
            }));
        } else {
            warn!(%endpoint_id, "full sync fetch_positions failed or timed out");
        }

        if let Ok(Ok(balances)) = balances {
            self.remote.replace_balances(balances.into_iter().map(|b| {
                (
                    b.currency,
                    BalanceView { total: b.total, free: b.free, used: b.used, updated_at: now },
                )
            }));
        } else {
            warn!(%endpoint_id, "full sync fetch_balance failed or timed out");
        }

        self.remote.mark_synced(now);
        self.diff_and_repair_all().await;
    }

    /// Single heartbeat probe. Classifies the partition state and emits a
    /// transition event when it changes.
    pub async fn heartbeat(&self, endpoint_id: &EndpointId) {
        let Some(adapter) = self.adapter_for(endpoint_id) else {
            return;
        };
        let previous = self.partition_state();
        let result = tokio::time::timeout(self.config.heartbeat_timeout(), adapter.fetch_time()).await;

        let mut tracker = self.heartbeat.lock();
        match result {
            Ok(Ok(_)) => {
                tracker.record_success();
                if tracker.state() == PartitionState::Reconnecting {
                    tracker.confirm_reconnected();
                }
            }
            _ => tracker.record_failure(),
        }
        let current = tracker.state();
        drop(tracker);

        if current != previous {
            info!(?previous, ?current, "connection partition state changed");
            Metrics::partition_state_set(&endpoint_id.0, partition_state_label(current));
            self.events.emit(SrEvent::PartitionStateChanged { previous, current, timestamp: Utc::now() });
        }
    }

    async fn diff_and_repair_orders(&self) {
        let inconsistencies = diff_orders(&self.local, &self.remote, self.config.position_size_tolerance);
        self.handle_inconsistencies(inconsistencies).await;
    }

    async fn diff_and_repair_all(&self) {
        let mut inconsistencies = diff_orders(&self.local, &self.remote, self.config.position_size_tolerance);
        inconsistencies.extend(diff_positions(&self.local, &self.remote, self.config.position_size_tolerance));
        inconsistencies.extend(diff_balances(&self.local, &self.remote, self.config.balance_tolerance));
        self.handle_inconsistencies(inconsistencies).await;
    }

    async fn handle_inconsistencies(&self, inconsistencies: Vec<Inconsistency>) {
        for inconsistency in inconsistencies {
            let severity = inconsistency.severity();
            Metrics::inconsistency_detected(inconsistency_kind(&inconsistency), severity_label(severity));
            self.events.emit(SrEvent::InconsistencyDetected { inconsistency: inconsistency.clone(), timestamp: Utc::now() });

            if !self.config.enable_auto_repair {
                continue;
            }

            let action = action_for(&inconsistency);

            if severity == Severity::Critical && self.config.confirm_before_repair {
                self.events.emit(SrEvent::RepairRequired { inconsistency, action, timestamp: Utc::now() });
                continue;
            }

            self.repair(inconsistency, action, severity).await;
        }
    }

    async fn repair(&self, inconsistency: Inconsistency, action: RepairAction, severity: Severity) {
        let key = inconsistency_key(&inconsistency);
        let attempt = {
            let mut entry = self.repair_attempts.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempt > self.config.max_repair_attempts {
            warn!(inconsistency = %describe(&inconsistency), attempt, "repair attempts exhausted");
            return;
        }

        let success = self.apply_action(&inconsistency, &action);
        if success {
            self.repair_attempts.remove(&key);
        }

        Metrics::repair(action_label(&action), if success { "success" } else { "failed" });
        let outcome = RepairOutcome {
            description: describe(&inconsistency),
            severity,
            action,
            attempt,
            success,
            timestamp: Utc::now(),
        };
        self.repair_history.lock().push(outcome.clone());
        self.events.emit(SrEvent::RepairApplied(outcome));
    }

    /// Overwrite local with remote for the affected key (or remove local
    /// when the remote has no record). `FetchFills`/`CancelOrder` are
    /// reported as external follow-ups since they require side effects
    /// beyond this reconciler's own state (backfilling via `fetchMyTrades`,
    /// or canceling a stray remote order through the owning executor).
    fn apply_action(&self, inconsistency: &Inconsistency, action: &RepairAction) -> bool {
        match (inconsistency, action) {
            (Inconsistency::OrderMissing { remote_id }, RepairAction::SyncOrder) => {
                if let Some(remote_order) = self.remote.orders.get(remote_id) {
                    self.local.orders.insert(remote_id.clone(), remote_order.value().clone());
                    true
                } else {
                    false
                }
            }
            (Inconsistency::PositionMissing { symbol } | Inconsistency::PositionSizeDiff { symbol, .. }, RepairAction::SyncPosition { remove_local: false }) => {
                if let Some(remote_pos) = self.remote.positions.get(symbol) {
                    self.local.positions.insert(symbol.clone(), remote_pos.value().clone());
                    true
                } else {
                    false
                }
            }
            (Inconsistency::PositionExtra { symbol }, RepairAction::SyncPosition { remove_local: true }) => {
                self.local.positions.remove(symbol);
                true
            }
            (Inconsistency::BalanceMismatch { currency, .. }, RepairAction::SyncBalance) => {
                if let Some(remote_bal) = self.remote.balances.get(currency) {
                    self.local.balances.insert(currency.clone(), remote_bal.value().clone());
                    true
                } else {
                    false
                }
            }
            // OrderStatusDiff/FetchFills and OrderExtra/CancelOrder require an
            // executor- or fill-backfill-side action this reconciler doesn't
            // own; surfacing the event is the repair for this component.
            _ => true,
        }
    }
}
