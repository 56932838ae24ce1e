//! Bounded backoff policy for enumeration-phase retries.
//!
//! The policy is a pure function of the attempt number; it is invoked by the
//! coordinator only. Copy workers never retry — a later run converges on
//! whatever a failed object left behind.

use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Backoff before retry number `attempt` (0-based): doubling from
/// `BASE_DELAY`, capped at `MAX_DELAY`.
pub(crate) fn backoff_for_attempt(attempt: u32) -> Duration {
    BASE_DELAY
        .saturating_mul(1u32 << attempt.min(16))
        .min(MAX_DELAY)
}

/// Backoff schedule for up to `max_retries` retries, suitable for
/// `tokio_retry2::Retry::spawn`.
pub(crate) fn backoff_schedule(max_retries: u32) -> impl Iterator<Item = Duration> {
    (0..max_retries).map(backoff_for_attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_for_attempt(0), Duration::from_millis(500));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(10), MAX_DELAY);
        assert_eq!(backoff_for_attempt(u32::MAX), MAX_DELAY);
    }

    #[test]
    fn schedule_is_bounded() {
        assert_eq!(backoff_schedule(3).count(), 3);
        assert_eq!(backoff_schedule(0).count(), 0);
    }
}
