//! Timestamps and the clock abstraction.
//!
//! Ledger timestamps are Unix epoch seconds (UTC). Snapshot versions use
//! milliseconds, so the clock exposes both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds in one day.
pub const DAY_SECS: u64 = 86_400;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis / 1000)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        Self::from_millis(SystemClock.now_millis())
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }

    pub fn saturating_add_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of wall-clock time.
///
/// Production code uses [`SystemClock`]; tests swap in a controllable clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now_millis())
    }
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // A clock set before 1970 reads as the epoch rather than panicking.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive_of_the_boundary() {
        let t = Timestamp::new(1_000);
        assert!(!t.has_expired(10, Timestamp::new(1_009)));
        assert!(t.has_expired(10, Timestamp::new(1_010)));
    }

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let t = Timestamp::new(50);
        assert_eq!(t.elapsed_since(Timestamp::new(20)), 0);
        assert_eq!(t.elapsed_since(Timestamp::new(80)), 30);
    }

    #[test]
    fn millis_truncate_to_seconds() {
        assert_eq!(Timestamp::from_millis(1_999).as_secs(), 1);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now().as_secs() > 1_577_836_800);
    }
}
