//! Monotonic clock source shared by the host loop and reboot recovery.
//!
//! `MonotonicClock` reads `Instant::now()` and sleeps the calling thread.
//! `ManualClock` only moves when slept or advanced, which makes reboot
//! windows and inter-ID delays deterministic in tests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time source used for cycle pacing and recovery scheduling.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Block the caller until `deadline`.
    fn sleep_until(&self, deadline: Instant);

    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration) {
        self.sleep_until(self.now() + duration);
    }
}

/// Wall-clock backed monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Clock that advances only when slept or explicitly advanced.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }

    /// Time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep_until(&self, deadline: Instant) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        let target = deadline.saturating_duration_since(self.base);
        if target > *offset {
            *offset = target;
        }
    }
}
