//! Minute-resolution time of day and second-resolution durations.
//!
//! Scheduled times are minutes since midnight of the service day. Services
//! running past midnight keep counting upwards (25:30 is 1530 minutes), so a
//! time is not bounded by 24:00 and two times on the same service day always
//! compare totally.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::Error;

/// A time of day with minute resolution.
///
/// [`Time::MAX`] is the infinity sentinel: strictly greater than every real
/// schedule time, absorbed by addition. [`Time::ZERO`] is the origin of the
/// service day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u16);

impl Time {
    pub const ZERO: Time = Time(0);
    /// Later than any real time; used as the "unreached" sentinel.
    pub const MAX: Time = Time(u16::MAX);

    pub const fn from_minutes(minutes: u16) -> Time {
        Time(minutes)
    }

    /// Build from clock fields; hours may exceed 23 for next-day overflow.
    ///
    /// # Panics
    ///
    /// If the total reaches the sentinel range.
    pub const fn from_hm(hours: u16, minutes: u16) -> Time {
        let total = hours as u32 * 60 + minutes as u32;
        assert!(total < u16::MAX as u32, "time of day out of range");
        Time(total as u16)
    }

    pub const fn minutes(self) -> u16 {
        self.0
    }

    pub const fn is_reachable(self) -> bool {
        self.0 != u16::MAX
    }

    /// Minutes between two times, as a [`Duration`].
    pub fn diff(self, other: Time) -> Duration {
        let minutes = self.0.abs_diff(other.0);
        Duration::from_seconds(u32::from(minutes) * 60)
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    /// Add a duration, snapping to minute resolution (half-up).
    ///
    /// Computed in 64-bit seconds so that a large duration added near the
    /// sentinel cannot wrap; the sentinel itself is absorbing.
    fn add(self, rhs: Duration) -> Time {
        if self == Time::MAX {
            return Time::MAX;
        }
        let seconds = i64::from(self.0) * 60 + i64::from(rhs.seconds());
        let minutes = (seconds + 30) / 60;
        if minutes >= i64::from(u16::MAX) {
            Time::MAX
        } else {
            Time(minutes as u16)
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Time::MAX {
            return write!(f, "--:--");
        }
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Time {
    type Err = Error;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds round half-up to the minute).
    /// Hours may exceed 23.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidTimeLiteral(s.to_string());

        let mut parts = s.split(':');
        let hours: u16 = parts
            .next()
            .filter(|p| !p.is_empty() && p.len() <= 3)
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minutes: u16 = parts
            .next()
            .filter(|p| p.len() == 2)
            .and_then(|p| p.parse().ok())
            .filter(|&m| m < 60)
            .ok_or_else(invalid)?;
        let seconds: u16 = match parts.next() {
            Some(p) if p.len() == 2 => p.parse().ok().filter(|&v| v < 60).ok_or_else(invalid)?,
            Some(_) => return Err(invalid()),
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Time::from_hm(hours, minutes) + Duration::from_seconds(u32::from(seconds)))
    }
}

/// A non-negative span of whole seconds.
///
/// Transfer times in feeds are given in seconds, finer than the schedule's
/// minute grid; the rounding happens when a duration is added to a [`Time`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Duration(u32);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_seconds(seconds: u32) -> Duration {
        Duration(seconds)
    }

    pub const fn from_minutes(minutes: u32) -> Duration {
        Duration(minutes * 60)
    }

    pub const fn seconds(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
