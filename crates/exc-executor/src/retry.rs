use exc_core::ErrorKind;

/// What the retry loop should do after an adapter error has been
/// classified, per the error-handling policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep on the rate-limit window, then retry within this submission.
    WaitRateLimit,
    /// Short fixed delay while the nonce/clock reanchors, then retry.
    WaitNonce,
    /// Fatal for this submission; surface immediately, no further retries.
    Fatal,
    /// Retry immediately, bounded by the network/exchange/unknown retry cap.
    RetryWithinCap,
}

#[must_use]
pub fn action_for(kind: ErrorKind) -> RetryAction {
    match kind {
        ErrorKind::RateLimited => RetryAction::WaitRateLimit,
        ErrorKind::NonceConflict => RetryAction::WaitNonce,
        ErrorKind::InsufficientBalance | ErrorKind::InvalidOrder => RetryAction::Fatal,
        ErrorKind::Network | ErrorKind::Exchange | ErrorKind::Unknown => RetryAction::RetryWithinCap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_never_retry() {
        assert_eq!(action_for(ErrorKind::InsufficientBalance), RetryAction::Fatal);
        assert_eq!(action_for(ErrorKind::InvalidOrder), RetryAction::Fatal);
    }

    #[test]
    fn recoverable_kinds_map_to_expected_actions() {
        assert_eq!(action_for(ErrorKind::RateLimited), RetryAction::WaitRateLimit);
        assert_eq!(action_for(ErrorKind::NonceConflict), RetryAction::WaitNonce);
        assert_eq!(action_for(ErrorKind::Network), RetryAction::RetryWithinCap);
        assert_eq!(action_for(ErrorKind::Exchange), RetryAction::RetryWithinCap);
        assert_eq!(action_for(ErrorKind::Unknown), RetryAction::RetryWithinCap);
    }
}
