use exc_core::EndpointId;

/// The executor's view of endpoint selection, satisfied by the Exchange
/// Failover Controller. Kept as a narrow trait here (rather than a direct
/// dependency on `exc-failover`) so the executor can be driven by a single
/// static endpoint in tests and by a live failover controller in
/// production, without a crate-level cycle.
pub trait EndpointSelector: Send + Sync {
    /// The endpoint SOE should attempt first.
    fn primary(&self) -> Option<EndpointId>;

    /// The next healthy endpoint not already in `exclude`, lowest priority
    /// first. Used by `execute_with_retry`'s endpoint fallback.
    fn next_healthy(&self, exclude: &[EndpointId]) -> Option<EndpointId>;
}

/// A selector over one fixed endpoint, for single-endpoint deployments and
/// tests that don't need failover.
pub struct StaticEndpoint(pub EndpointId);

impl EndpointSelector for StaticEndpoint {
    fn primary(&self) -> Option<EndpointId> {
        Some(self.0.clone())
    }

    fn next_healthy(&self, exclude: &[EndpointId]) -> Option<EndpointId> {
        if exclude.contains(&self.0) {
            None
        } else {
            Some(self.0.clone())
        }
    }
}
