//! Prometheus metrics for the execution core.
//!
//! Covers the four components' observability surface: order submission
//! outcomes (SOE), endpoint health and failover (EFC), state reconciliation
//! (SR), and execution quality (EQM).
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally: registration only
//! fails on a duplicate metric name, a programmer error that should crash
//! at startup rather than run with broken observability.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec, CounterVec, GaugeVec, HistogramVec, IntCounterVec, IntGaugeVec,
};

/// Orders submitted, labeled by endpoint and outcome (filled/canceled/rejected/failed).
pub static ORDERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "exc_orders_submitted_total",
        "Total orders submitted by endpoint",
        &["endpoint", "symbol"]
    )
    .unwrap()
});

/// Order completions, labeled by terminal state.
pub static ORDERS_COMPLETED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "exc_orders_completed_total",
        "Total orders reaching a terminal state",
        &["endpoint", "state"]
    )
    .unwrap()
});

/// Reprice (cancel-and-resubmit) events.
pub static REPRICE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("exc_reprice_total", "Total cancel-and-reprice events", &["endpoint", "symbol"]).unwrap()
});

/// Rate-limit backoff wait duration in milliseconds.
pub static RATE_LIMIT_WAIT_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "exc_rate_limit_wait_ms",
        "Rate-limit backoff wait duration in milliseconds",
        &["endpoint"],
        vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Endpoint health status, one gauge per endpoint (1=healthy, 0=unhealthy/offline).
pub static ENDPOINT_HEALTHY: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("exc_endpoint_healthy", "Endpoint health state (1=healthy)", &["endpoint"]).unwrap()
});

/// Endpoint probe latency in milliseconds.
pub static PROBE_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "exc_probe_latency_ms",
        "Health probe round-trip latency in milliseconds",
        &["endpoint"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0]
    )
    .unwrap()
});

/// Failover events, labeled by reason.
pub static FAILOVER_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("exc_failover_total", "Total primary endpoint failovers", &["reason"]).unwrap()
});

/// Inconsistencies detected during reconciliation, by kind and severity.
pub static INCONSISTENCIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "exc_inconsistencies_total",
        "Total inconsistencies detected during reconciliation",
        &["kind", "severity"]
    )
    .unwrap()
});

/// Repair attempts, labeled by action and outcome.
pub static REPAIRS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("exc_repairs_total", "Total repair attempts", &["action", "outcome"]).unwrap()
});

/// Connection partition state, one gauge per endpoint (1=active state).
pub static PARTITION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("exc_partition_state", "Connection partition state (1=active)", &["endpoint", "state"])
        .unwrap()
});

/// Execution slippage, signed, dimensionless (positive = unfavorable).
pub static EXECUTION_SLIPPAGE: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "exc_execution_slippage",
        "Execution slippage relative to expected price, signed",
        &["symbol", "side"],
        vec![-0.02, -0.01, -0.005, -0.002, -0.001, 0.0, 0.001, 0.002, 0.005, 0.01, 0.02]
    )
    .unwrap()
});

/// Execution wall-clock time in milliseconds.
pub static EXECUTION_TIME_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "exc_execution_time_ms",
        "Wall-clock time from tracking start to completion in milliseconds",
        &["symbol"],
        vec![100.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 15000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Fill rate at completion (0.0-1.0).
pub static FILL_RATE: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "exc_fill_rate",
        "Fraction of requested amount filled at completion",
        &["symbol"],
        vec![0.0, 0.2, 0.5, 0.8, 0.9, 0.95, 0.99, 1.0]
    )
    .unwrap()
});

/// Execution quality bucket classification counts.
pub static QUALITY_BUCKET_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "exc_quality_bucket_total",
        "Count of completed executions by quality bucket",
        &["symbol", "bucket"]
    )
    .unwrap()
});

/// Execution anomalies detected, labeled by trigger.
pub static ANOMALIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("exc_anomalies_total", "Total execution anomalies detected", &["symbol", "trigger"])
        .unwrap()
});

/// Metrics facade grouping the recording calls by component.
pub struct Metrics;

impl Metrics {
    pub fn order_submitted(endpoint: &str, symbol: &str) {
        ORDERS_SUBMITTED_TOTAL.with_label_values(&[endpoint, symbol]).inc();
    }

    pub fn order_completed(endpoint: &str, state: &str) {
        ORDERS_COMPLETED_TOTAL.with_label_values(&[endpoint, state]).inc();
    }

    pub fn reprice(endpoint: &str, symbol: &str) {
        REPRICE_TOTAL.with_label_values(&[endpoint, symbol]).inc();
    }

    pub fn rate_limit_wait(endpoint: &str, wait_ms: f64) {
        RATE_LIMIT_WAIT_MS.with_label_values(&[endpoint]).observe(wait_ms);
    }

    pub fn endpoint_healthy(endpoint: &str, healthy: bool) {
        ENDPOINT_HEALTHY.with_label_values(&[endpoint]).set(i64::from(healthy));
    }

    pub fn probe_latency(endpoint: &str, latency_ms: f64) {
        PROBE_LATENCY_MS.with_label_values(&[endpoint]).observe(latency_ms);
    }

    pub fn failover(reason: &str) {
        FAILOVER_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn inconsistency_detected(kind: &str, severity: &str) {
        INCONSISTENCIES_TOTAL.with_label_values(&[kind, severity]).inc();
    }

    pub fn repair(action: &str, outcome: &str) {
        REPAIRS_TOTAL.with_label_values(&[action, outcome]).inc();
    }

    /// Only the active state should report 1; the rest are reset to 0.
    pub fn partition_state_set(endpoint: &str, state: &str) {
        for s in &["connected", "partial", "partitioned", "reconnecting"] {
            PARTITION_STATE.with_label_values(&[endpoint, s]).set(0.0);
        }
        PARTITION_STATE.with_label_values(&[endpoint, state]).set(1.0);
    }

    pub fn slippage(symbol: &str, side: &str, slippage: f64) {
        EXECUTION_SLIPPAGE.with_label_values(&[symbol, side]).observe(slippage);
    }

    pub fn execution_time(symbol: &str, time_ms: f64) {
        EXECUTION_TIME_MS.with_label_values(&[symbol]).observe(time_ms);
    }

    pub fn fill_rate(symbol: &str, rate: f64) {
        FILL_RATE.with_label_values(&[symbol]).observe(rate);
    }

    pub fn quality_bucket(symbol: &str, bucket: &str) {
        QUALITY_BUCKET_TOTAL.with_label_values(&[symbol, bucket]).inc();
    }

    pub fn anomaly(symbol: &str, trigger: &str) {
        ANOMALIES_TOTAL.with_label_values(&[symbol, trigger]).inc();
    }
}
