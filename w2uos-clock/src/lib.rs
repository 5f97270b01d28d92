//! Time sources for W2UOS.
//!
//! Components take an `Arc<dyn Clock>` instead of calling `Utc::now()`
//! directly so that the same code runs against real time in a live node and
//! against a manually advanced [`TestClock`] in tests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("advancing by {0:?} overflows the clock")]
    Overflow(Duration),

    #[error("cannot move clock back from {current} to {requested}")]
    NonMonotonic {
        current: DateTime<Utc>,
        requested: DateTime<Utc>,
    },
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system wall clock on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveClock;

impl LiveClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock whose instant only changes when the harness moves it.
#[derive(Debug)]
pub struct TestClock {
    instant: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Creates a clock fixed at the Unix epoch.
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Moves the clock forward and returns the new instant.
    pub fn advance(&self, by: Duration) -> Result<DateTime<Utc>, ClockError> {
        let delta = chrono::Duration::from_std(by).map_err(|_| ClockError::Overflow(by))?;
        let mut guard = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        let next = guard
            .checked_add_signed(delta)
            .ok_or(ClockError::Overflow(by))?;
        *guard = next;
        Ok(next)
    }

    pub fn set_time(&self, to: DateTime<Utc>) -> Result<(), ClockError> {
        let mut guard = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        if to < *guard {
            return Err(ClockError::NonMonotonic {
                current: *guard,
                requested: to,
            });
        }
        *guard = to;
        Ok(())
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_is_fixed_until_advanced() {
        let clock = TestClock::new();
        let first = clock.now();
        assert_eq!(first, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.now(), first);

        let next = clock.advance(Duration::from_millis(1500)).unwrap();
        assert_eq!(next, first + chrono::Duration::milliseconds(1500));
        assert_eq!(clock.now(), next);
    }

    #[test]
    fn test_clock_rejects_moving_backwards() {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        let clock = TestClock::starting_at(start);

        let err = clock
            .set_time(start - chrono::Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, ClockError::NonMonotonic { .. }));
        assert_eq!(clock.now(), start);

        clock.set_time(start + chrono::Duration::days(1)).unwrap();
        assert_eq!(clock.now(), start + chrono::Duration::days(1));
    }

    #[test]
    fn test_clock_reports_overflow() {
        let clock = TestClock::new();
        let err = clock.advance(Duration::MAX).unwrap_err();
        assert_eq!(err, ClockError::Overflow(Duration::MAX));
        assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn live_clock_moves_forward() {
        let clock = LiveClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn clocks_are_usable_as_trait_objects() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TestClock>();
        let clocks: Vec<Box<dyn Clock>> = vec![Box::new(LiveClock), Box::new(TestClock::new())];
        assert_eq!(clocks.len(), 2);
    }
}
