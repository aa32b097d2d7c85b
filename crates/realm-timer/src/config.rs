//! Wall-clock pacing of the game clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TimerError;

/// How fast the clock thread advances the game clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How long the clock thread sleeps between checks. Capped at the tick
    /// interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl TimerConfig {
    /// Build a config with the given tick interval and the default poll
    /// interval.
    pub const fn with_tick_interval_ms(tick_interval_ms: u64) -> Self {
        Self {
            tick_interval_ms,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Check that the intervals make sense.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidConfig`] if either interval is zero.
    pub fn validate(&self) -> Result<(), TimerError> {
        if self.tick_interval_ms == 0 {
            return Err(TimerError::InvalidConfig {
                reason: "tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(TimerError::InvalidConfig {
                reason: "poll_interval_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// Return the tick interval.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Return the effective poll interval: `min(tick, poll)`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(self.tick_interval_ms))
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_poll_interval_ms() -> u64 {
    100
}
