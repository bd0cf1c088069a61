//! Nonce Coordinator: per-endpoint monotonically increasing request nonce
//! with clock-skew correction.
//!
//! A nonce is `max(lastIssued + 1, now + skew)`, written back as the new
//! `lastIssued`. Nonces are keyed per endpoint, since each endpoint's clock
//! drifts independently, and reset on a detected nonce/timestamp rejection
//! so a single bad round trip doesn't poison every later request.

use dashmap::DashMap;
use exc_core::EndpointId;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
struct NonceState {
    last_issued: i64,
    skew_ms: i64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Issues strictly increasing nonces per endpoint, corrected for clock skew
/// against each endpoint's server clock.
pub struct NonceCoordinator {
    states: DashMap<EndpointId, NonceState>,
}

impl NonceCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Issue the next nonce for `endpoint`. Always strictly greater than the
    /// previously issued value and than `now + skew`.
    pub fn next(&self, endpoint: &EndpointId) -> i64 {
        let now = now_ms();
        let mut state = self.states.entry(endpoint.clone()).or_default();
        let target = now.saturating_add(state.skew_ms);
        let candidate = (state.last_issued.saturating_add(1)).max(target);
        state.last_issued = candidate;
        candidate
    }

    /// Handle a vendor error classified as nonce/timestamp/signature drift.
    /// Extracts an embedded server timestamp if the message carries one;
    /// otherwise nudges `skew` forward by one second and re-anchors the
    /// counter by resetting `lastIssued` to 0, so the next call derives
    /// purely from `now + skew`.
    pub fn handle_drift_error(&self, endpoint: &EndpointId, vendor_message: &str) {
        let mut state = self.states.entry(endpoint.clone()).or_default();
        match exc_core::extract_server_time_ms(vendor_message) {
            Some(server_time_ms) => {
                state.skew_ms = server_time_ms.saturating_sub(now_ms());
            }
            None => {
                state.skew_ms = state.skew_ms.saturating_add(1000);
            }
        }
        state.last_issued = 0;
        warn!(endpoint = %endpoint, skew_ms = state.skew_ms, "nonce drift detected, re-anchoring");
    }

    /// Opportunistically sync `skew` against a known-good server time, e.g.
    /// at startup via `fetchTime`.
    pub fn sync_clock(&self, endpoint: &EndpointId, server_time_ms: i64) {
        let mut state = self.states.entry(endpoint.clone()).or_default();
        state.skew_ms = server_time_ms.saturating_sub(now_ms());
    }
}

impl Default for NonceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
