//! Exchange Failover Controller: active health probing, latency tracking,
//! primary election with cooldown, and one-shot auto-recovery. Implements
//! `exc_executor::EndpointSelector` so a `SmartOrderExecutor` can be driven
//! directly by live failover state.

pub mod config;
pub mod controller;
pub mod events;
pub mod health;

pub use config::EfcConfig;
pub use controller::FailoverController;
pub use events::{FailoverEvent, FailoverReason};
pub use health::{EndpointHealth, EndpointStatus};
