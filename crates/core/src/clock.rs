//! Wall-clock source + IANA timezone conversion. A trait rather than a bare
//! `Utc::now()` call so the scheduler loop and write API's tests can drive
//! deterministic time.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when explicitly told to, so scheduler-loop and compiler tests can assert
/// exact `next_send_at` values without timing flakiness.
#[derive(Debug, Clone)]
pub struct FakeClock(Arc<Mutex<DateTime<Utc>>>);

impl FakeClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn advance(&self, duration: Duration) {
        let mut guard = self.0.lock().expect("fake clock mutex poisoned");
        *guard += duration;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().expect("fake clock mutex poisoned") = to;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("fake clock mutex poisoned")
    }
}

/// Parses the process-wide `INPUT_TZ` configuration value.
pub fn parse_input_tz(name: &str) -> Result<Tz, CoreError> {
    name.parse()
        .map_err(|_| CoreError::InvalidRule(format!("unknown IANA timezone: {name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_by_the_requested_duration() {
        let start = Utc::now();
        let clock = FakeClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }

    #[test]
    fn parse_input_tz_rejects_unknown_names() {
        assert!(parse_input_tz("Not/AZone").is_err());
        assert!(parse_input_tz("Africa/Lagos").is_ok());
    }
}
