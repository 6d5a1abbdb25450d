//! Time source for the engine
//!
//! Every timestamp the engine writes comes from a single `Clock` handle, so
//! tests can pin or advance time without touching the scheduler.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
///
/// Direct time control is for tests; production wiring uses [`SystemClock`].
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use spinwheel_engine::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::seconds(30));
/// assert_eq!(clock.now() - before, Duration::seconds(30));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Utc::now());
        let t0 = clock.now();

        clock.advance(Duration::milliseconds(1_500));
        assert_eq!(clock.now() - t0, Duration::milliseconds(1_500));
    }

    #[test]
    fn test_manual_clock_set_overrides() {
        let clock = ManualClock::new(Utc::now());
        let target = clock.now() + Duration::hours(2);

        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
