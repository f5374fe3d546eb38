//! Timestamp utilities
//!
//! Ledger operations read wall-clock time at the moment of the call and use
//! the stored window/activity timestamps for all derived state; there are no
//! background timers inside the ledger substrate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds in a 24-hour minting window
pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Seconds in one calendar month for activity accounting (30 days)
pub const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;

/// Months of inactivity after which a member is considered inactive
pub const INACTIVITY_THRESHOLD_MONTHS: u64 = 12;

/// Get the current timestamp in seconds
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Get the current timestamp in milliseconds
pub fn timestamp_ms() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    since_epoch.as_secs() * 1000 + since_epoch.subsec_millis() as u64
}

/// Whole months elapsed in a span of seconds
pub fn months_in(span_secs: u64) -> u64 {
    span_secs / SECS_PER_MONTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months_in() {
        assert_eq!(months_in(0), 0);
        assert_eq!(months_in(SECS_PER_MONTH - 1), 0);
        assert_eq!(months_in(SECS_PER_MONTH), 1);
        assert_eq!(months_in(13 * SECS_PER_MONTH), 13);
    }

    #[test]
    fn test_timestamps_are_monotonic_enough() {
        let a = timestamp_secs();
        let b = timestamp_ms();
        assert!(b / 1000 >= a - 1);
    }
}
