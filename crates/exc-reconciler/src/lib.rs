//! State Reconciler: periodic and on-demand diffing of local order,
//! position, and balance views against an exchange endpoint's authoritative
//! state, connection-partition detection via heartbeat, and bounded
//! automatic repair.

pub mod config;
pub mod diff;
pub mod events;
pub mod partition;
pub mod reconciler;
pub mod repair;
pub mod view;

pub use config::SrConfig;
pub use diff::{Inconsistency, Severity};
pub use events::SrEvent;
pub use partition::{HeartbeatTracker, PartitionState};
pub use reconciler::StateReconciler;
pub use repair::{RepairAction, RepairHistory, RepairOutcome};
pub use view::{BalanceView, Ledger, OrderView, PositionView};
