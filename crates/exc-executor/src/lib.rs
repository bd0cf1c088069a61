//! Smart Order Executor: per-account serialized, globally bounded order
//! submission with automatic cancel-and-reprice, retry classification, and
//! dry-run shadowing.

pub mod config;
pub mod dry_run;
pub mod endpoint;
pub mod events;
pub mod executor;
pub mod reprice;
pub mod retry;
pub mod stats;

pub use config::SoeConfig;
pub use endpoint::{EndpointSelector, StaticEndpoint};
pub use events::{ExecutionResult, SoeEvent};
pub use executor::{SmartOrderExecutor, SubmitRequest};
pub use stats::StatsSnapshot;
