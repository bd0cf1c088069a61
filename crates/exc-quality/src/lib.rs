//! Execution Quality Monitor: tracks per-order fills, classifies finished
//! executions by slippage/timing/fill-rate, rolls them into short-term,
//! daily, and lifetime windows, and raises anomalies.
//!
//! Aggregate statistics are hand-computed over raw stored samples rather
//! than Prometheus histograms, since the rolling windows need exact
//! percentiles over a bounded, evictable sample set rather than a
//! cumulative distribution. `exc-telemetry` still receives the classified
//! counters (`quality_bucket`, `anomaly`) for cross-process observability;
//! this crate owns the windowed math those counters are derived from.

pub mod anomaly;
pub mod config;
pub mod events;
pub mod monitor;
pub mod quality;
pub mod record;
pub mod tracking;
pub mod window;

pub use anomaly::{Anomaly, AnomalyKind};
pub use config::EqmConfig;
pub use events::EqmEvent;
pub use monitor::ExecutionQualityMonitor;
pub use quality::{classify, QualityBucket};
pub use record::{finalize, slippage, ExecutionRecord, FinalStatus};
pub use tracking::{FillRecord, TrackedExecution, TrackingStatus};
pub use window::{aggregate, compute_stats, AggregateSnapshot, FillRateSummary, QualityDistribution, RollingWindow, SignDistribution, Stats};
