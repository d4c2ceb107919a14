//! # Playback Time
//!
//! Millisecond timestamp used for every position, duration and seek target
//! in the session. Values are never negative: constructors clamp to zero and
//! subtraction saturates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A non-negative position or duration in milliseconds.
///
/// ```
/// use core_playback::PlaybackTime;
///
/// assert_eq!(PlaybackTime::from_millis(-5).millis(), 0);
/// assert_eq!(PlaybackTime::from_secs(90) - PlaybackTime::from_secs(1), PlaybackTime::from_secs(89));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackTime(u64);

impl PlaybackTime {
    pub const ZERO: PlaybackTime = PlaybackTime(0);

    /// Creates a time from milliseconds, clamping negative input to zero.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.max(0) as u64)
    }

    /// Creates a time from whole seconds, clamping negative input to zero.
    pub fn from_secs(secs: i64) -> Self {
        Self::from_millis(secs.saturating_mul(1_000))
    }

    /// Creates a time from fractional seconds as reported by render engines.
    ///
    /// NaN and negative values become zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * 1_000.0).round().min(u64::MAX as f64) as u64)
    }

    pub fn millis(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Whole seconds, truncated.
    pub fn whole_secs(self) -> u64 {
        self.0 / 1_000
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, rhs: PlaybackTime) -> PlaybackTime {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for PlaybackTime {
    fn from(duration: Duration) -> Self {
        Self(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Add for PlaybackTime {
    type Output = PlaybackTime;

    fn add(self, rhs: PlaybackTime) -> PlaybackTime {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for PlaybackTime {
    type Output = PlaybackTime;

    fn sub(self, rhs: PlaybackTime) -> PlaybackTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for PlaybackTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.whole_secs();
        let (hours, minutes, seconds) = (total_secs / 3_600, (total_secs / 60) % 60, total_secs % 60);
        if hours > 0 {
            write!(f, "{}:{:02}:{:02}.{:03}", hours, minutes, seconds, self.0 % 1_000)
        } else {
            write!(f, "{:02}:{:02}.{:03}", minutes, seconds, self.0 % 1_000)
        }
    }
}
