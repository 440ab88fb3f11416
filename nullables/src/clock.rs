//! Nullable clock: deterministic time for testing.

use drift_types::{Clock, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Atomic so the same clock can
/// be shared across the core's background tasks.
pub struct NullClock {
    current_millis: AtomicU64,
}

impl NullClock {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            current_millis: AtomicU64::new(initial.as_millis()),
        }
    }

    pub fn at_secs(secs: u64) -> Self {
        Self::new(Timestamp::from_secs(secs))
    }

    /// Advance time by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.current_millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, to: Timestamp) {
        self.current_millis.store(to.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.current_millis.load(Ordering::SeqCst))
    }
}
