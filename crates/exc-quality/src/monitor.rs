use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use exc_core::{AccountId, ClientId, EndpointId, EventBus, Price, Side, Symbol};
use exc_telemetry::Metrics;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::anomaly::{self, Anomaly, AnomalyKind};
use crate::config::EqmConfig;
use crate::events::EqmEvent;
use crate::record::{self, FinalStatus};
use crate::tracking::TrackedExecution;
use crate::window::RollingWindow;

fn anomaly_trigger(kind: AnomalyKind) -> &'static str {
    match kind {
        AnomalyKind::ThresholdSlippage => "threshold_slippage",
        AnomalyKind::ThresholdExecutionTime => "threshold_execution_time",
        AnomalyKind::ThresholdFillRate => "threshold_fill_rate",
        AnomalyKind::StatisticalSlippage => "statistical_slippage",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    symbol: Symbol,
    endpoint_id: EndpointId,
    account_id: AccountId,
}

/// Tracks in-flight orders from submission through completion, classifies
/// each finished execution, rolls it into per-symbol/endpoint/account and
/// global windows, and raises anomalies as they're observed.
pub struct ExecutionQualityMonitor {
    config: EqmConfig,
    active: DashMap<ClientId, TrackedExecution>,
    windows: DashMap<WindowKey, Mutex<RollingWindow>>,
    global: Mutex<RollingWindow>,
    events: EventBus<EqmEvent>,
    stopped: AtomicBool,
}

impl ExecutionQualityMonitor {
    #[must_use]
    pub fn new(config: EqmConfig) -> Self {
        Self {
            config,
            active: DashMap::new(),
            windows: DashMap::new(),
            global: Mutex::new(RollingWindow::new()),
            events: EventBus::new(),
            stopped: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EqmEvent> {
        self.events.subscribe()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start_tracking(
        &self,
        id: ClientId,
        symbol: Symbol,
        side: Side,
        endpoint_id: EndpointId,
        account_id: AccountId,
        expected_price: Price,
        amount: exc_core::Amount,
    ) {
        let execution = TrackedExecution::new(symbol, side, endpoint_id, account_id, expected_price, amount, Utc::now());
        self.active.insert(id, execution);
    }

    /// Record a fill against a tracked execution. No-op if `id` isn't known
    /// (already completed, or never started).
    pub fn update_fill(&self, id: &ClientId, price: Price, amount: exc_core::Amount, fee: Price) {
        if let Some(mut execution) = self.active.get_mut(id) {
            execution.record_fill(price, amount, fee, Utc::now());
        }
    }

    /// Finalize a tracked execution: classify it, check for anomalies
    /// against the existing per-key baseline, then fold it into that
    /// baseline and the global window.
    pub fn complete_tracking(&self, id: &ClientId, final_status: FinalStatus) {
        let Some((_, execution)) = self.active.remove(id) else {
            return;
        };
        let now = Utc::now();
        let record = record::finalize(&execution, final_status, now, &self.config);

        let key = WindowKey { symbol: record.symbol.clone(), endpoint_id: record.endpoint_id.clone(), account_id: record.account_id.clone() };
        let window = self.windows.entry(key).or_insert_with(|| Mutex::new(RollingWindow::new()));
        let mut window = window.lock();

        let anomaly = anomaly::detect(&record, &window, &self.config);

        window.push(record.clone(), &self.config, now);
        drop(window);
        self.global.lock().push(record.clone(), &self.config, now);

        use rust_decimal::prelude::ToPrimitive;
        let symbol = record.symbol.0.as_str();
        Metrics::slippage(symbol, &record.side.to_string(), record.slippage.to_f64().unwrap_or(0.0));
        Metrics::execution_time(symbol, record.execution_time_ms as f64);
        Metrics::fill_rate(symbol, record.fill_rate.to_f64().unwrap_or(0.0));
        Metrics::quality_bucket(symbol, record.quality.as_str());

        self.events.emit(EqmEvent::ExecutionCompleted(record.clone()));
        if let Some(anomaly) = anomaly {
            info!(symbol = %record.symbol, kind = ?anomaly.kind, "execution quality anomaly detected");
            Metrics::anomaly(symbol, anomaly_trigger(anomaly.kind));
            self.events.emit(EqmEvent::AnomalyDetected { record, anomaly });
        }
    }

    fn emit_aggregation(&self, key: &WindowKey, window: &RollingWindow, now: chrono::DateTime<Utc>) {
        let short_term = window.short_term(&self.config, now);
        let daily = window.daily();
        self.events.emit(EqmEvent::AggregationComputed {
            symbol: key.symbol.clone(),
            endpoint_id: key.endpoint_id.clone(),
            short_term,
            daily,
        });
    }

    fn aggregate_once(&self) {
        let now = Utc::now();
        for entry in self.windows.iter() {
            let window = entry.value().lock();
            self.emit_aggregation(entry.key(), &window, now);
        }
        debug!(keys = self.windows.len(), "execution quality aggregation pass complete");
    }

    /// Background aggregation loop: recomputes and emits per-key snapshots
    /// every `aggregation_interval` until `stop()` is called.
    pub async fn run_aggregation_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.aggregation_interval());
        loop {
            ticker.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            self.aggregate_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exc_core::Amount;
    use rust_decimal_macros::dec;

    fn monitor() -> ExecutionQualityMonitor {
        ExecutionQualityMonitor::new(EqmConfig::default())
    }

    #[test]
    fn complete_tracking_without_start_is_a_noop() {
        let monitor = monitor();
        monitor.complete_tracking(&ClientId::new(), FinalStatus::Filled);
    }

    #[tokio::test]
    async fn completed_execution_emits_execution_completed_event() {
        let monitor = monitor();
        let mut rx = monitor.subscribe();
        let id = ClientId::new();
        monitor.start_tracking(
            id.clone(),
            Symbol::from("BTC/USDT"),
            Side::Buy,
            EndpointId::from("binance"),
            AccountId::from("acct-1"),
            Price::new(dec!(50000)),
            Amount::new(dec!(1)),
        );
        monitor.update_fill(&id, Price::new(dec!(50000)), Amount::new(dec!(1)), Price::ZERO);
        monitor.complete_tracking(&id, FinalStatus::Filled);

        let event = rx.try_recv().expect("event expected");
        assert!(matches!(event, EqmEvent::ExecutionCompleted(_)));
    }

    #[tokio::test]
    async fn extreme_slippage_emits_anomaly_event() {
        let monitor = monitor();
        let mut rx = monitor.subscribe();
        let id = ClientId::new();
        monitor.start_tracking(
            id.clone(),
            Symbol::from("BTC/USDT"),
            Side::Buy,
            EndpointId::from("binance"),
            AccountId::from("acct-1"),
            Price::new(dec!(50000)),
            Amount::new(dec!(1)),
        );
        monitor.update_fill(&id, Price::new(dec!(51000)), Amount::new(dec!(1)), Price::ZERO);
        monitor.complete_tracking(&id, FinalStatus::Filled);

        let _completed = rx.try_recv().expect("completed event expected");
        let anomaly_event = rx.try_recv().expect("anomaly event expected");
        assert!(matches!(anomaly_event, EqmEvent::AnomalyDetected { .. }));
    }
}
