//! Structured logging and Prometheus metrics shared by every crate in the
//! execution core. The percentile/window aggregation the Execution Quality
//! Monitor needs lives in `exc-quality` itself (an in-memory ring buffer,
//! not a Prometheus histogram) since its rolling sub-buckets require
//! eviction that Prometheus histograms cannot express; this crate only
//! carries the gauges/counters/histograms the rest of the core emits
//! alongside it.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
