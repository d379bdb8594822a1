//! Clock abstraction for testable time-dependent logic
//!
//! Queues read the current instant for batch windows and sleep for
//! backpressure through a [`Clock`], so tests can substitute a clock that
//! records sleeps instead of performing them.

use std::fmt;
#[cfg(test)]
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use crate::core::cancel::CancellationToken;

/// Abstraction over time and sleeping
pub trait Clock: Send + Sync + fmt::Debug {
    /// Get the current monotonic time (for measuring intervals)
    fn now(&self) -> Instant;

    /// Get the current system time (for timestamps)
    fn system_time(&self) -> SystemTime;

    /// Sleep for `duration` unless `token` is cancelled first
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool;
}

/// Production clock using the system time and real sleeps
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !token.is_cancelled();
        }
        !token.wait_timeout(duration)
    }
}

/// Mock clock for deterministic testing
///
/// Sleeping advances the mock time immediately and records the requested
/// duration.
#[cfg(test)]
#[derive(Debug)]
pub struct MockClock {
    current_instant: Mutex<Instant>,
    current_system_time: Mutex<SystemTime>,
    sleeps: Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl MockClock {
    pub fn new() -> Self {
        Self {
            current_instant: Mutex::new(Instant::now()),
            current_system_time: Mutex::new(SystemTime::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Advance both monotonic and system time by the given duration
    pub fn advance_time(&self, duration: Duration) {
        *self.current_instant.lock().unwrap() += duration;
        *self.current_system_time.lock().unwrap() += duration;
    }

    /// Durations passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }

    fn system_time(&self) -> SystemTime {
        *self.current_system_time.lock().unwrap()
    }

    fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool {
        self.sleeps.lock().unwrap().push(duration);
        self.advance_time(duration);
        !token.is_cancelled()
    }
}
