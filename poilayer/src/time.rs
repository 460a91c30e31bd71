//! Wall-clock abstraction.
//!
//! Cache deadlines are absolute epoch milliseconds, so every component that
//! compares against "now" takes a [`Clock`] instead of reading the system
//! time directly. Tests drive time forward with [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Returns the current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock.
///
/// Starts at a fixed instant and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(duration_ms(by), Ordering::SeqCst);
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Converts a duration to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
