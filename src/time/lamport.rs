//! Scalar Lamport clock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A single logical time. `t1 > t2` means `t1` causally dominates `t2`.
pub type LamportTime = u64;

/// Monotonic scalar logical clock. All operations are atomic, so one clock
/// can be shared across threads without external locking.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// Returns a clock starting at a specific time.
    pub fn new(value: LamportTime) -> Self {
        LamportClock {
            value: AtomicU64::new(value),
        }
    }

    /// The current time.
    pub fn value(&self) -> LamportTime {
        self.value.load(Ordering::Acquire)
    }

    /// Advances the clock by one and returns the new time.
    pub fn incr(&self) -> LamportTime {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Indicates whether this clock is causally greater than the other.
    pub fn dominates(&self, other: &LamportClock) -> bool {
        self.value() > other.value()
    }

    /// Folds an observed time into the clock, leaving it strictly newer than
    /// both the observed time and its own previous value.
    pub fn merge(&self, time: LamportTime) {
        loop {
            let ours = self.value.load(Ordering::Acquire);
            if time <= ours {
                // Already in our past, nothing to record.
                return;
            }

            if self
                .value
                .compare_exchange(ours, time + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            // Lost the race. Either the winner moved the clock past `time`
            // and the reload bails out above, or we retry against the newer
            // value; progress is guaranteed either way.
        }
    }
}

impl Clone for LamportClock {
    fn clone(&self) -> Self {
        LamportClock::new(self.value())
    }
}
