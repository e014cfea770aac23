//! Time units and duration parsing.
//!
//! [`TimeUnit`] names the unit a bare period is expressed in. Conversions to
//! coarser units truncate toward zero and saturate at `u64::MAX`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when parsing units or durations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeUnitError {
    /// Unrecognised unit name.
    #[error("unknown time unit: {0}")]
    UnknownUnit(String),

    /// Malformed duration expression.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// A unit of time, from nanoseconds to days.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "ns")]
    Nanoseconds,
    #[serde(alias = "us")]
    Microseconds,
    #[serde(alias = "ms")]
    Milliseconds,
    #[serde(alias = "s")]
    #[default]
    Seconds,
    #[serde(alias = "m")]
    Minutes,
    #[serde(alias = "h")]
    Hours,
    #[serde(alias = "d")]
    Days,
}

impl TimeUnit {
    /// All units, finest first.
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    const fn nanos(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Days => 86_400_000_000_000,
        }
    }

    /// Convert `amount` of this unit into `target` units.
    ///
    /// Converting to a coarser unit truncates toward zero; converting to a
    /// finer unit saturates at `u64::MAX`.
    pub fn convert(self, amount: u64, target: TimeUnit) -> u64 {
        let nanos = u128::from(amount) * self.nanos();
        u64::try_from(nanos / target.nanos()).unwrap_or(u64::MAX)
    }

    /// Convert `amount` of this unit into whole milliseconds.
    pub fn to_millis(self, amount: u64) -> u64 {
        self.convert(amount, TimeUnit::Milliseconds)
    }

    /// Convert `amount` of this unit into a [`Duration`] without rounding.
    pub fn to_duration(self, amount: u64) -> Duration {
        let nanos = u128::from(amount) * self.nanos();
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        let subsec = (nanos % 1_000_000_000) as u32;
        Duration::new(secs, subsec)
    }

    /// Check if this unit is finer than a millisecond.
    pub fn is_sub_millisecond(self) -> bool {
        self < TimeUnit::Milliseconds
    }

    /// Short suffix used in duration strings.
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeUnit {
    type Err = TimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ns" | "nanos" | "nanosecond" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "micros" | "microsecond" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "millis" | "millisecond" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            other => Err(TimeUnitError::UnknownUnit(other.to_string())),
        }
    }
}

/// Parse a duration string like "250ms", "30s", "1h30m" or "2d".
pub fn parse_duration(s: &str) -> Result<Duration, TimeUnitError> {
    let trimmed = s.trim();
    let mut total = Duration::ZERO;
    let mut chars = trimmed.chars().peekable();
    let mut parsed_any = false;

    while chars.peek().is_some() {
        let mut number = String::new();
        while let Some(c) = chars.peek().filter(|c| c.is_ascii_digit()) {
            number.push(*c);
            chars.next();
        }
        let mut suffix = String::new();
        while let Some(c) = chars.peek().filter(|c| c.is_ascii_alphabetic()) {
            suffix.push(*c);
            chars.next();
        }

        if number.is_empty() || suffix.is_empty() {
            return Err(TimeUnitError::InvalidDuration(s.to_string()));
        }

        let amount: u64 = number
            .parse()
            .map_err(|_| TimeUnitError::InvalidDuration(s.to_string()))?;
        let unit: TimeUnit = suffix
            .parse()
            .map_err(|_| TimeUnitError::InvalidDuration(s.to_string()))?;

        total = total.saturating_add(unit.to_duration(amount));
        parsed_any = true;
    }

    if !parsed_any {
        return Err(TimeUnitError::InvalidDuration(s.to_string()));
    }

    Ok(total)
}

/// Render a duration in the format accepted by [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    for unit in TimeUnit::ALL.iter().rev() {
        if nanos % unit.nanos() == 0 && nanos >= unit.nanos() {
            return format!("{}{}", nanos / unit.nanos(), unit.suffix());
        }
    }
    format!("{}ns", nanos)
}

/// Serde adapter for durations written as human strings.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
