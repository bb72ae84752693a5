//! Time source for timelock comparisons.
//!
//! Waiting for a timelock is never a blocking wait: each operation reads the
//! clock once and compares against the recorded request time.

use chrono::Utc;

use crate::Timestamp;

/// Monotonic seconds source consulted by every time-dependent operation.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::Clock;
    use crate::Timestamp;

    /// Clock advanced explicitly by tests.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        now: AtomicU64,
    }

    impl ManualClock {
        #[must_use]
        pub fn new(start: Timestamp) -> Self {
            Self {
                now: AtomicU64::new(start),
            }
        }

        pub fn advance(&self, secs: u64) {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }

        pub fn set(&self, at: Timestamp) {
            self.now.store(at, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            self.now.load(Ordering::SeqCst)
        }
    }
}
