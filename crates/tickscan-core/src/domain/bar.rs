use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::{Interval, Symbol, ValidationError, ZonedDateTime};

/// Integrity defect of a single bar, reported by the quality validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarDefect {
    NonFinitePrice,
    NonPositivePrice,
    HighBelowBody,
    LowAboveBody,
}

/// OHLCV bar.
///
/// Fields are public so the provider layer can materialize rows exactly as
/// delivered; [`Bar::integrity`] is the single place the price invariants are
/// checked, and the quality validator drops rows that fail it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: ZonedDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Validating constructor for callers that build bars by hand.
    pub fn new(
        ts: ZonedDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        let bar = Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        };
        match bar.integrity() {
            None => Ok(bar),
            Some(BarDefect::NonFinitePrice) => Err(ValidationError::NonFiniteValue {
                field: "open/high/low/close",
            }),
            Some(BarDefect::NonPositivePrice) => Err(ValidationError::NonPositiveValue {
                field: "open/high/low/close",
            }),
            Some(BarDefect::HighBelowBody) => Err(ValidationError::HighBelowBody),
            Some(BarDefect::LowAboveBody) => Err(ValidationError::LowAboveBody),
        }
    }

    /// First integrity defect of this bar, or `None` when the bar is sound:
    /// finite positive prices, `high >= max(open, close)`,
    /// `low <= min(open, close)`.
    pub fn integrity(&self) -> Option<BarDefect> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some(BarDefect::NonFinitePrice);
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Some(BarDefect::NonPositivePrice);
        }
        if self.high < self.open.max(self.close) {
            return Some(BarDefect::HighBelowBody);
        }
        if self.low > self.open.min(self.close) {
            return Some(BarDefect::LowAboveBody);
        }
        None
    }

    /// True range against the previous close.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let range = self.high - self.low;
        let high_gap = (self.high - prev_close).abs();
        let low_gap = (self.low - prev_close).abs();
        range.max(high_gap).max(low_gap)
    }
}

/// Ordered bar sequence for one symbol and interval.
///
/// Timestamps are strictly increasing. Pipeline stages never mutate a series
/// in place; each stage that changes the data produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: Symbol,
    pub interval: Interval,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn new(symbol: Symbol, interval: Interval, bars: Vec<Bar>) -> Result<Self, ValidationError> {
        for (index, window) in bars.windows(2).enumerate() {
            if window[1].ts == window[0].ts {
                return Err(ValidationError::DuplicateTimestamp { index: index + 1 });
            }
            if window[1].ts < window[0].ts {
                return Err(ValidationError::NonMonotonicTimestamps { index: index + 1 });
            }
        }
        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The single offset all bars carry, or `None` when the series is empty
    /// or mixes offsets. The staleness guard rejects mixed-offset series.
    pub fn uniform_offset(&self) -> Option<UtcOffset> {
        let first = self.bars.first()?.ts.offset();
        self.bars
            .iter()
            .all(|bar| bar.ts.offset() == first)
            .then_some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(input: &str) -> ZonedDateTime {
        ZonedDateTime::parse(input).expect("timestamp")
    }

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("symbol")
    }

    #[test]
    fn rejects_high_below_body() {
        let err = Bar::new(ts("2024-03-04T09:30:00-05:00"), 10.0, 10.2, 9.8, 10.5, 100)
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::HighBelowBody));
    }

    #[test]
    fn integrity_flags_nan_before_bounds() {
        let bar = Bar {
            ts: ts("2024-03-04T09:30:00-05:00"),
            open: f64::NAN,
            high: 1.0,
            low: 5.0,
            close: 1.0,
            volume: 0,
        };
        assert_eq!(bar.integrity(), Some(BarDefect::NonFinitePrice));
    }

    #[test]
    fn true_range_covers_gaps() {
        let bar = Bar::new(ts("2024-03-04T09:31:00-05:00"), 10.0, 10.5, 9.9, 10.2, 100)
            .expect("bar");
        // Gap down from a 12.0 close dominates the intrabar range.
        assert!((bar.true_range(12.0) - 2.1).abs() < 1e-9);
        assert!((bar.true_range(10.1) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let bar = Bar::new(ts("2024-03-04T09:30:00-05:00"), 10.0, 10.5, 9.9, 10.2, 100)
            .expect("bar");
        let err = Series::new(symbol(), Interval::OneMinute, vec![bar, bar]).expect_err("must fail");
        assert!(matches!(err, ValidationError::DuplicateTimestamp { index: 1 }));
    }

    #[test]
    fn series_rejects_reordered_timestamps() {
        let later = Bar::new(ts("2024-03-04T09:31:00-05:00"), 10.0, 10.5, 9.9, 10.2, 100)
            .expect("bar");
        let earlier = Bar::new(ts("2024-03-04T09:30:00-05:00"), 10.0, 10.5, 9.9, 10.2, 100)
            .expect("bar");
        let err =
            Series::new(symbol(), Interval::OneMinute, vec![later, earlier]).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonMonotonicTimestamps { index: 1 }));
    }

    #[test]
    fn uniform_offset_detects_mixed_series() {
        let eastern = Bar::new(ts("2024-03-04T09:30:00-05:00"), 10.0, 10.5, 9.9, 10.2, 100)
            .expect("bar");
        let utc = Bar::new(ts("2024-03-04T14:31:00Z"), 10.0, 10.5, 9.9, 10.2, 100).expect("bar");
        let series =
            Series::new(symbol(), Interval::OneMinute, vec![eastern, utc]).expect("series");
        assert_eq!(series.uniform_offset(), None);
    }
}
