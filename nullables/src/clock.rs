//! Deterministic clock for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use stakeflow_types::Clock;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Shareable across tasks.
pub struct NullClock {
    millis: AtomicU64,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            millis: AtomicU64::new(initial_secs * 1000),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    /// Advance time by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u64) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeflow_types::Timestamp;

    #[test]
    fn only_moves_when_told() {
        let clock = NullClock::new(100);
        assert_eq!(clock.now(), Timestamp::new(100));
        clock.advance(5);
        assert_eq!(clock.now(), Timestamp::new(105));
        clock.advance_millis(1_500);
        assert_eq!(clock.now_millis(), 106_500);
        clock.set(7);
        assert_eq!(clock.now(), Timestamp::new(7));
    }
}
