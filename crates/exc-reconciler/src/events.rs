use chrono::{DateTime, Utc};

use crate::diff::Inconsistency;
use crate::partition::PartitionState;
use crate::repair::{RepairAction, RepairOutcome};

#[derive(Debug, Clone)]
pub enum SrEvent {
    InconsistencyDetected { inconsistency: Inconsistency, timestamp: DateTime<Utc> },
    RepairApplied(RepairOutcome),
    /// A `Critical` inconsistency under `confirmBeforeRepair` was found but
    /// not auto-repaired; an external operator must act.
    RepairRequired { inconsistency: Inconsistency, action: RepairAction, timestamp: DateTime<Utc> },
    PartitionStateChanged { previous: PartitionState, current: PartitionState, timestamp: DateTime<Utc> },
}
