use chrono::{DateTime, Utc};
use exc_core::EndpointId;

/// Why a primary promotion happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverReason {
    /// The prior primary fell to `Unhealthy`/`Offline` and a probe pass
    /// promoted a healthy candidate.
    Unhealthy,
    /// A one-shot auto-recovery timer restored the original, lower-priority
    /// primary.
    Recovered,
    /// `switch_to` was called directly.
    Manual,
}

#[derive(Debug, Clone)]
pub enum FailoverEvent {
    Failover {
        from: Option<EndpointId>,
        to: EndpointId,
        reason: FailoverReason,
        timestamp: DateTime<Utc>,
    },
    /// The primary is down and no other registered endpoint is an eligible
    /// candidate.
    NoBackupAvailable { timestamp: DateTime<Utc> },
}
