use serde::{Deserialize, Serialize};

use crate::{ConfigError, Interval};

/// Tunable thresholds for the signal evaluator and staleness guard.
///
/// Construction is cheap and infallible; [`AlgorithmSettings::validate`] is
/// called by the scanner before any fetching begins, and a violation is fatal
/// for the whole scan rather than a per-symbol status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSettings {
    /// Multiplier applied to ATR when deriving the band lines off EMA21.
    pub atr_multiplier: f64,
    /// Maximum intrabar range as a multiple of ATR.
    pub volatility_filter: f64,
    /// Maximum extension from EMA8, scaled by ATR over close.
    pub fomo_filter: f64,
    /// Slope threshold for classifying EMA5 as rising/falling.
    pub ema5_rising_threshold: f64,
    /// Slope threshold for classifying EMA8 as rising/falling.
    pub ema8_rising_threshold: f64,
    /// Slope threshold for classifying EMA21 as rising/falling.
    pub ema21_rising_threshold: f64,
    /// Confirmation timeframe; must be coarser than the scan interval.
    pub higher_timeframe: Interval,
    /// Whether pre/post-market sessions count as open for staleness checks.
    pub include_extended_hours: bool,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            atr_multiplier: 2.0,
            volatility_filter: 1.5,
            fomo_filter: 1.0,
            ema5_rising_threshold: 0.02,
            ema8_rising_threshold: 0.01,
            ema21_rising_threshold: 0.005,
            higher_timeframe: Interval::FifteenMinutes,
            include_extended_hours: true,
        }
    }
}

impl AlgorithmSettings {
    pub fn validate(&self, scan_interval: Interval) -> Result<(), ConfigError> {
        range("atr_multiplier", self.atr_multiplier, 0.5, 10.0)?;
        range("volatility_filter", self.volatility_filter, 0.5, 5.0)?;
        if !self.fomo_filter.is_finite() || self.fomo_filter < 0.0 {
            return Err(ConfigError::Negative {
                field: "fomo_filter",
                value: self.fomo_filter,
            });
        }
        range("ema5_rising_threshold", self.ema5_rising_threshold, 0.0, 0.05)?;
        range("ema8_rising_threshold", self.ema8_rising_threshold, 0.0, 0.05)?;
        range(
            "ema21_rising_threshold",
            self.ema21_rising_threshold,
            0.0,
            0.05,
        )?;

        if self.higher_timeframe.bucket_seconds() <= scan_interval.bucket_seconds() {
            return Err(ConfigError::HigherTimeframeNotCoarser {
                interval: scan_interval.as_str().to_owned(),
            });
        }

        Ok(())
    }

    /// Slope threshold for one of the trend-classified EMA periods.
    pub fn rising_threshold(&self, period: usize) -> f64 {
        match period {
            5 => self.ema5_rising_threshold,
            8 => self.ema8_rising_threshold,
            _ => self.ema21_rising_threshold,
        }
    }
}

fn range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}
