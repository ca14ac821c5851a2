use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::ValidationError;

/// Supported bar intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl Interval {
    pub const ALL: [Self; 5] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
        }
    }

    /// Bucket width of one bar.
    pub const fn bucket(self) -> Duration {
        match self {
            Self::OneMinute => Duration::minutes(1),
            Self::FiveMinutes => Duration::minutes(5),
            Self::FifteenMinutes => Duration::minutes(15),
            Self::ThirtyMinutes => Duration::minutes(30),
            Self::OneHour => Duration::hours(1),
        }
    }

    pub const fn bucket_seconds(self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::ThirtyMinutes => 1_800,
            Self::OneHour => 3_600,
        }
    }

    /// Hard provider-side ceiling on the lookback window, in days.
    pub const fn max_lookback_days(self) -> u32 {
        match self {
            Self::OneMinute => 7,
            Self::FiveMinutes | Self::FifteenMinutes | Self::ThirtyMinutes => 60,
            Self::OneHour => 730,
        }
    }

    /// Maximum age of the latest bar while the market is open before the
    /// series is treated as stale. 1m and 15m are pinned by the upstream
    /// requirements; the rest scale with the bucket.
    pub const fn staleness_allowance(self) -> Duration {
        match self {
            Self::OneMinute => Duration::minutes(2),
            Self::FiveMinutes => Duration::minutes(10),
            Self::FifteenMinutes => Duration::minutes(20),
            Self::ThirtyMinutes => Duration::minutes(40),
            Self::OneHour => Duration::minutes(80),
        }
    }

    /// Minimum bar count required before indicator work is attempted.
    pub const fn min_bars(self) -> usize {
        match self {
            Self::OneMinute => 100,
            _ => 50,
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "30m" => Ok(Self::ThirtyMinutes),
            "1h" => Ok(Self::OneHour),
            other => Err(ValidationError::InvalidInterval {
                value: other.to_owned(),
            }),
        }
    }
}

/// Requested lookback window in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lookback(u32);

impl Lookback {
    pub const fn days(days: u32) -> Self {
        Self(days)
    }

    pub const fn as_days(self) -> u32 {
        self.0
    }

    pub const fn exceeds_ceiling(self, interval: Interval) -> bool {
        self.0 > interval.max_lookback_days()
    }
}

impl Display for Lookback {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.0)
    }
}

impl FromStr for Lookback {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().to_ascii_lowercase();
        let digits = trimmed.strip_suffix('d').unwrap_or(&trimmed);
        digits
            .parse::<u32>()
            .ok()
            .filter(|days| *days > 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidLookback {
                value: value.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval() {
        let interval = Interval::from_str("30m").expect("must parse");
        assert_eq!(interval, Interval::ThirtyMinutes);
    }

    #[test]
    fn rejects_unsupported_interval() {
        let err = Interval::from_str("2h").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidInterval { .. }));
    }

    #[test]
    fn one_minute_ceiling_is_seven_days() {
        assert!(!Lookback::days(7).exceeds_ceiling(Interval::OneMinute));
        assert!(Lookback::days(10).exceeds_ceiling(Interval::OneMinute));
        assert!(!Lookback::days(60).exceeds_ceiling(Interval::FifteenMinutes));
        assert!(Lookback::days(61).exceeds_ceiling(Interval::FifteenMinutes));
    }

    #[test]
    fn parses_lookback() {
        assert_eq!(Lookback::from_str("7d").expect("must parse"), Lookback::days(7));
        assert_eq!(Lookback::from_str("60").expect("must parse"), Lookback::days(60));
    }

    #[test]
    fn rejects_zero_lookback() {
        let err = Lookback::from_str("0d").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidLookback { .. }));
    }
}
