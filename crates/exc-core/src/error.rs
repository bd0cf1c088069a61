//! Error taxonomy shared across the execution core.
//!
//! `classify` runs an ordered, first-match-wins substring rule list over
//! vendor error text. The ordering is load-bearing: rate-limit before nonce
//! before balance before invalid before network before exchange. Vendor
//! messages routinely trip more than one of these substrings at once (e.g.
//! "rate limited due to invalid timestamp"), so the rule list's order IS the
//! classification policy, not an implementation detail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by an `ExchangeAdapter` call.
#[derive(Debug, Clone, Error)]
#[error("adapter error: {message}")]
pub struct AdapterError {
    pub message: String,
    pub status: Option<u16>,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Classification bucket for an adapter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    RateLimited,
    NonceConflict,
    InsufficientBalance,
    InvalidOrder,
    Network,
    Exchange,
    Unknown,
}

impl ErrorKind {
    /// Errors recovered within the submission's own retry loop.
    #[must_use]
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NonceConflict | Self::Network | Self::Exchange | Self::Unknown
        )
    }

    /// Errors that are fatal for the current submission attempt and must be
    /// surfaced to the caller immediately, without retry.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InsufficientBalance | Self::InvalidOrder)
    }
}

/// Ordered rule list: (kind, substrings). First matching kind wins.
fn rules() -> &'static [(ErrorKind, &'static [&'static str])] {
    &[
        (ErrorKind::RateLimited, &["rate limit", "too many"]),
        (
            ErrorKind::NonceConflict,
            &[
                "nonce",
                "timestamp",
                "recvwindow",
                "request timestamp",
                "invalid signature",
                "time in force",
            ],
        ),
        (
            ErrorKind::InsufficientBalance,
            &["insufficient", "balance", "margin"],
        ),
        (ErrorKind::InvalidOrder, &["invalid", "rejected", "post only"]),
        (ErrorKind::Network, &["network", "timeout", "connection"]),
        (ErrorKind::Exchange, &["exchange", "server", "unavailable"]),
    ]
}

/// Classify an adapter error using status code (HTTP 429) and ordered
/// substring matching over the lowercased message.
#[must_use]
pub fn classify(error: &AdapterError) -> ErrorKind {
    if error.status == Some(429) {
        return ErrorKind::RateLimited;
    }
    let lower = error.message.to_lowercase();
    for (kind, needles) in rules() {
        if needles.iter().any(|needle| lower.contains(needle)) {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

static SERVER_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"server[ _-]?time[^0-9]*(\d{10,13})").unwrap());

/// Best-effort extraction of a server timestamp (milliseconds) embedded in a
/// nonce/timestamp-classified vendor error string, used to resync the clock
/// offset without waiting on a dedicated time endpoint.
#[must_use]
pub fn extract_server_time_ms(message: &str) -> Option<i64> {
    let lower = message.to_lowercase();
    SERVER_TIME_RE
        .captures(&lower)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_rate_limit_wins_over_network_keywords() {
        let err = AdapterError::new("rate limit exceeded on this connection");
        assert_eq!(classify(&err), ErrorKind::RateLimited);
    }

    #[test]
    fn ordering_nonce_wins_over_invalid() {
        let err = AdapterError::new("invalid nonce value supplied");
        assert_eq!(classify(&err), ErrorKind::NonceConflict);
    }

    #[test]
    fn ordering_balance_wins_over_invalid() {
        let err = AdapterError::new("invalid request: insufficient balance");
        assert_eq!(classify(&err), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn http_429_classifies_as_rate_limited_regardless_of_text() {
        let err = AdapterError::with_status("unexpected failure", 429);
        assert_eq!(classify(&err), ErrorKind::RateLimited);
    }

    #[test]
    fn unrecognized_text_is_unknown() {
        let err = AdapterError::new("something totally unforeseen happened");
        assert_eq!(classify(&err), ErrorKind::Unknown);
    }

    #[test]
    fn server_time_extraction() {
        let msg = "Timestamp for this request is outdated. ServerTime: 1700000000123";
        assert_eq!(extract_server_time_ms(msg), Some(1_700_000_000_123));
    }

    #[test]
    fn server_time_extraction_absent() {
        assert_eq!(extract_server_time_ms("nonce too small"), None);
    }
}
