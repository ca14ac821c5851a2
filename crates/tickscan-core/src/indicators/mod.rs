//! Rolling-window indicator engine.
//!
//! One row per bar, indexed by timestamp. Everything is recomputed from the
//! cleaned series on every scan; nothing here persists across runs.

mod atr;
mod ema;
mod trend;

pub use atr::atr;
pub use ema::ema;
pub use trend::{classify, slope, Trend};

use serde::{Deserialize, Serialize};

use crate::{AlgorithmSettings, Series, ZonedDateTime};

pub const EMA_PERIODS: [usize; 5] = [5, 8, 13, 21, 50];
pub const ATR_PERIOD: usize = 14;

/// Bars needed before every column of a row is populated: the 50-bar EMA
/// seed plus the 14-bar ATR window. Shorter series still compute, with the
/// missing columns absent and trends classified `insufficient_data`.
pub const FULL_WARMUP_BARS: usize = 64;

/// Computed indicator values for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ts: ZonedDateTime,
    pub ema5: Option<f64>,
    pub ema8: Option<f64>,
    pub ema13: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub atr: Option<f64>,
    /// `ema21 - atr_multiplier * atr`
    pub atr_long_line: Option<f64>,
    /// `ema21 + atr_multiplier * atr`
    pub atr_short_line: Option<f64>,
    pub ema5_trend: Trend,
    pub ema8_trend: Trend,
    pub ema21_trend: Trend,
    pub ema5_slope: Option<f64>,
    pub ema8_slope: Option<f64>,
    pub ema21_slope: Option<f64>,
}

/// Per-bar indicator table derived from one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorSet {
    pub fn compute(series: &Series, settings: &AlgorithmSettings) -> Self {
        let bars = &series.bars;
        let ema5 = ema(bars, 5);
        let ema8 = ema(bars, 8);
        let ema13 = ema(bars, 13);
        let ema21 = ema(bars, 21);
        let ema50 = ema(bars, 50);
        let atr = atr(bars, ATR_PERIOD);

        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let band = |sign: f64| match (ema21[i], atr[i]) {
                    (Some(center), Some(atr)) => {
                        Some(center + sign * settings.atr_multiplier * atr)
                    }
                    _ => None,
                };

                IndicatorRow {
                    ts: bar.ts,
                    ema5: ema5[i],
                    ema8: ema8[i],
                    ema13: ema13[i],
                    ema21: ema21[i],
                    ema50: ema50[i],
                    atr: atr[i],
                    atr_long_line: band(-1.0),
                    atr_short_line: band(1.0),
                    ema5_trend: classify(&ema5, i, settings.ema5_rising_threshold),
                    ema8_trend: classify(&ema8, i, settings.ema8_rising_threshold),
                    ema21_trend: classify(&ema21, i, settings.ema21_rising_threshold),
                    ema5_slope: slope(&ema5, i),
                    ema8_slope: slope(&ema8, i),
                    ema21_slope: slope(&ema21, i),
                }
            })
            .collect();

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, Interval, Symbol, ZonedDateTime};

    fn rising_series(len: usize) -> Series {
        let base = ZonedDateTime::parse("2024-03-04T09:30:00-05:00").expect("timestamp");
        let bars = (0..len)
            .map(|i| {
                let ts = ZonedDateTime::from_offset_datetime(
                    base.into_inner() + time::Duration::minutes(i as i64),
                );
                // 1% per bar keeps the 3-bar relative slope above every
                // default rising threshold once the EMAs are warmed up.
                let close = 100.0 * 1.01_f64.powi(i as i32);
                Bar::new(ts, close - 0.5, close + 0.5, close - 1.0, close, 1_000).expect("bar")
            })
            .collect();
        Series::new(Symbol::parse("AAPL").expect("symbol"), Interval::OneMinute, bars)
            .expect("series")
    }

    #[test]
    fn produces_one_row_per_bar() {
        let series = rising_series(120);
        let set = IndicatorSet::compute(&series, &AlgorithmSettings::default());
        assert_eq!(set.len(), 120);
        assert_eq!(set.rows[0].ts, series.bars[0].ts);
    }

    #[test]
    fn full_warmup_populates_every_column() {
        let series = rising_series(120);
        let set = IndicatorSet::compute(&series, &AlgorithmSettings::default());
        let row = set.rows[FULL_WARMUP_BARS];
        assert!(row.ema50.is_some());
        assert!(row.atr.is_some());
        assert!(row.atr_long_line.is_some());
        assert!(row.atr_short_line.is_some());
    }

    #[test]
    fn short_series_degrades_to_insufficient_data() {
        let series = rising_series(10);
        let set = IndicatorSet::compute(&series, &AlgorithmSettings::default());
        let last = set.last().expect("rows");
        assert!(last.ema50.is_none());
        assert_eq!(last.ema21_trend, Trend::InsufficientData);
    }

    #[test]
    fn band_lines_straddle_ema21() {
        let series = rising_series(120);
        let set = IndicatorSet::compute(&series, &AlgorithmSettings::default());
        let row = set.last().expect("rows");
        let center = row.ema21.expect("ema21");
        assert!(row.atr_long_line.expect("long line") < center);
        assert!(row.atr_short_line.expect("short line") > center);
    }

    #[test]
    fn steadily_rising_closes_classify_rising() {
        let series = rising_series(120);
        let set = IndicatorSet::compute(&series, &AlgorithmSettings::default());
        let row = set.last().expect("rows");
        assert_eq!(row.ema5_trend, Trend::Rising);
        assert_eq!(row.ema8_trend, Trend::Rising);
        assert_eq!(row.ema21_trend, Trend::Rising);
    }
}
