//! Tunables for the scheduler loop.

use chrono_tz::Tz;

/// The `passed` sweep grace must exceed `2 * TICK_SECONDS` at the default
/// tick period, so it is not itself configurable — only `tick_seconds` is,
/// and construction rejects a value that would violate the invariant.
const PASSED_SWEEP_GRACE_SECS: i64 = 120;

/// Per-user cap on due items fetched per tick.
const DUE_ITEM_CAP: i64 = 50;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Loop period. Default 30s.
    pub tick_seconds: u64,
    /// Schedule compiler's default timezone (`INPUT_TZ`).
    pub input_tz: Tz,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "tick_seconds ({0}) must be < {max_tick} so the passed-sweep grace of {grace}s stays > 2 * tick_seconds",
        max_tick = PASSED_SWEEP_GRACE_SECS / 2,
        grace = PASSED_SWEEP_GRACE_SECS
    )]
    TickTooLarge(u64),
}

impl SchedulerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::TickTooLarge`] when `tick_seconds` would make
    /// the fixed 2-minute `passed` sweep grace a false-positive trap (it must
    /// stay strictly greater than `2 * tick_seconds`).
    pub fn new(tick_seconds: u64, input_tz: Tz) -> Result<Self, ConfigError> {
        if (tick_seconds as i64) * 2 >= PASSED_SWEEP_GRACE_SECS {
            return Err(ConfigError::TickTooLarge(tick_seconds));
        }
        Ok(Self {
            tick_seconds,
            input_tz,
        })
    }

    #[must_use]
    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_seconds)
    }

    #[must_use]
    pub fn passed_sweep_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(PASSED_SWEEP_GRACE_SECS)
    }

    /// Crash-orphan sweep threshold: `running` rows older than `2 * tick`
    /// are presumed abandoned.
    #[must_use]
    pub fn crash_orphan_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(2 * self.tick_seconds as i64)
    }

    #[must_use]
    pub fn due_item_cap(&self) -> i64 {
        DUE_ITEM_CAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tick_seconds_that_would_violate_the_grace_invariant() {
        let tz: Tz = "UTC".parse().unwrap();
        assert!(SchedulerConfig::new(30, tz).is_ok());
        assert!(SchedulerConfig::new(60, tz).is_err());
        assert!(SchedulerConfig::new(90, tz).is_err());
    }
}
