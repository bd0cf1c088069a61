use chrono::{DateTime, Utc};

use crate::diff::{Inconsistency, Severity};

/// Concrete corrective action for a detected inconsistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    SyncOrder,
    /// `remove_local = true` when the remote has no record of a position
    /// the local view believes exists.
    SyncPosition { remove_local: bool },
    SyncBalance,
    FetchFills,
    /// For a stray order the remote has and local does not recognize.
    CancelOrder,
    NoAction,
}

#[must_use]
pub fn action_for(inconsistency: &Inconsistency) -> RepairAction {
    match inconsistency {
        Inconsistency::OrderMissing { .. } => RepairAction::SyncOrder,
        Inconsistency::OrderExtra { .. } => RepairAction::CancelOrder,
        Inconsistency::OrderStatusDiff { .. } => RepairAction::FetchFills,
        Inconsistency::PositionMissing { .. } => RepairAction::SyncPosition { remove_local: false },
        Inconsistency::PositionExtra { .. } => RepairAction::SyncPosition { remove_local: true },
        Inconsistency::PositionSizeDiff { .. } => RepairAction::SyncPosition { remove_local: false },
        Inconsistency::BalanceMismatch { .. } => RepairAction::SyncBalance,
    }
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub description: String,
    pub severity: Severity,
    pub action: RepairAction,
    pub attempt: u32,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// A bounded FIFO log of repair attempts, oldest evicted first once
/// `capacity` is exceeded.
#[derive(Debug)]
pub struct RepairHistory {
    entries: std::collections::VecDeque<RepairOutcome>,
    capacity: usize,
}

impl RepairHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { entries: std::collections::VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, outcome: RepairOutcome) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(outcome);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<RepairOutcome> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exc_core::RemoteId;

    #[test]
    fn missing_local_order_is_synced() {
        let inc = Inconsistency::OrderMissing { remote_id: RemoteId("r1".into()) };
        assert_eq!(action_for(&inc), RepairAction::SyncOrder);
    }

    #[test]
    fn extra_remote_order_is_canceled() {
        let inc = Inconsistency::OrderExtra { remote_id: RemoteId("r1".into()) };
        assert_eq!(action_for(&inc), RepairAction::CancelOrder);
    }

    #[test]
    fn position_extra_removes_local() {
        let inc = Inconsistency::PositionExtra { symbol: exc_core::Symbol::from("BTC/USDT") };
        assert_eq!(action_for(&inc), RepairAction::SyncPosition { remove_local: true });
    }

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let mut history = RepairHistory::new(2);
        for i in 0..3 {
            history.push(RepairOutcome {
                description: format!("entry-{i}"),
                severity: Severity::Medium,
                action: RepairAction::SyncOrder,
                attempt: 1,
                success: true,
                timestamp: Utc::now(),
            });
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].description, "entry-1");
        assert_eq!(snapshot[1].description, "entry-2");
    }
}
