/// Connection-quality classification derived from consecutive heartbeat
/// outcomes. Grounded on the same consecutive-failure/success counting the
/// failover controller's probe loop uses for endpoint health, applied here
/// to the reconciler's own connectivity signal rather than an endpoint's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Connected,
    Partial,
    Partitioned,
    Reconnecting,
}

#[derive(Debug)]
pub struct HeartbeatTracker {
    state: PartitionState,
    consecutive_failures: u32,
    threshold: u32,
}

impl HeartbeatTracker {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self { state: PartitionState::Connected, consecutive_failures: 0, threshold }
    }

    #[must_use]
    pub fn state(&self) -> PartitionState {
        self.state
    }

    pub fn record_success(&mut self) {
        let was_partitioned = matches!(self.state, PartitionState::Partitioned);
        self.consecutive_failures = 0;
        self.state = if was_partitioned { PartitionState::Reconnecting } else { PartitionState::Connected };
    }

    /// A second success after `Reconnecting` confirms the connection; call
    /// this once the caller has observed one full successful sync cycle
    /// beyond the initial recovering heartbeat.
    pub fn confirm_reconnected(&mut self) {
        if matches!(self.state, PartitionState::Reconnecting) {
            self.state = PartitionState::Connected;
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.state = if self.consecutive_failures >= self.threshold {
            PartitionState::Partitioned
        } else {
            PartitionState::Partial
        };
    }
}
