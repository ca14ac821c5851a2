use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{IndicatorRow, IndicatorSet};
use crate::{AlgorithmSettings, Bar, Series, Symbol, ZonedDateTime};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

/// The gate that rejected a candidate bar, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    IndicatorsUnavailable,
    PolarFormation,
    EmaPositioning,
    Trend,
    FomoFilter,
    VolatilityFilter,
    HigherTimeframe,
}

/// Why no signal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The branch that was evaluated, absent when neither applied.
    pub direction: Option<Direction>,
    pub gate: Gate,
}

impl Rejection {
    fn branchless(gate: Gate) -> Self {
        Self {
            direction: None,
            gate,
        }
    }

    pub fn reason(&self) -> String {
        let gate = match self.gate {
            Gate::IndicatorsUnavailable => "indicators_unavailable",
            Gate::PolarFormation => "polar_formation",
            Gate::EmaPositioning => "ema_positioning",
            Gate::Trend => "trend",
            Gate::FomoFilter => "fomo_filter",
            Gate::VolatilityFilter => "volatility_filter",
            Gate::HigherTimeframe => "higher_timeframe",
        };
        match self.direction {
            Some(Direction::Long) => format!("long:{gate}"),
            Some(Direction::Short) => format!("short:{gate}"),
            None => gate.to_owned(),
        }
    }
}

/// A confirmed entry signal. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub direction: Direction,
    pub ts: ZonedDateTime,
    pub price: f64,
    /// Indicator snapshot at signal time.
    pub indicators: IndicatorRow,
    /// Diagnostic slope-strength score in [0, 1]; never a gate.
    pub confidence: f64,
}

/// Terminal outcome of evaluating one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Signal(Signal),
    NoSignal(Rejection),
}

impl Evaluation {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Signal(signal) => Some(signal),
            Self::NoSignal(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Signal(_) => None,
            Self::NoSignal(rejection) => Some(*rejection),
        }
    }
}

/// Higher-timeframe confirmation context: the last HTF bucket that completed
/// strictly before the evaluation bar, so the forming bucket (whose close is
/// by construction the evaluation close itself) never self-confirms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HtfContext {
    pub row: IndicatorRow,
    pub open: f64,
    pub close: f64,
}

impl HtfContext {
    pub fn latest_completed(
        htf_series: &Series,
        htf_indicators: &IndicatorSet,
        eval_ts: ZonedDateTime,
    ) -> Option<Self> {
        let index = htf_series
            .bars
            .iter()
            .rposition(|bar| bar.ts < eval_ts)?;
        let bar = &htf_series.bars[index];
        let row = *htf_indicators.rows.get(index)?;
        Some(Self {
            row,
            open: bar.open,
            close: bar.close,
        })
    }
}

struct Columns {
    ema5: f64,
    ema8: f64,
    ema21: f64,
    atr: f64,
    atr_long_line: f64,
    atr_short_line: f64,
}

impl Columns {
    fn from_row(row: &IndicatorRow) -> Option<Self> {
        Some(Self {
            ema5: row.ema5?,
            ema8: row.ema8?,
            ema21: row.ema21?,
            atr: row.atr?,
            atr_long_line: row.atr_long_line?,
            atr_short_line: row.atr_short_line?,
        })
    }
}

/// Applies the layered long/short rule sets to one bar.
///
/// Each branch is a strict AND over its gates, evaluated in order; the first
/// failed gate is the recorded rejection. The polar formation makes the two
/// branches mutually exclusive: a bar cannot close both above and below its
/// open.
pub struct SignalEvaluator<'a> {
    settings: &'a AlgorithmSettings,
}

impl<'a> SignalEvaluator<'a> {
    pub fn new(settings: &'a AlgorithmSettings) -> Self {
        Self { settings }
    }

    pub fn evaluate(
        &self,
        symbol: &Symbol,
        bar: &Bar,
        row: &IndicatorRow,
        htf: Option<&HtfContext>,
    ) -> Evaluation {
        let Some(columns) = Columns::from_row(row) else {
            return Evaluation::NoSignal(Rejection::branchless(Gate::IndicatorsUnavailable));
        };

        let direction = if bar.close > bar.open {
            Direction::Long
        } else if bar.close < bar.open {
            Direction::Short
        } else {
            return Evaluation::NoSignal(Rejection::branchless(Gate::PolarFormation));
        };

        let failed = |gate| {
            Evaluation::NoSignal(Rejection {
                direction: Some(direction),
                gate,
            })
        };

        match direction {
            Direction::Long => {
                if !(bar.close > columns.ema8 && bar.close > columns.ema21) {
                    return failed(Gate::PolarFormation);
                }
                if !(columns.ema5 < columns.atr_long_line) {
                    return failed(Gate::EmaPositioning);
                }
                let rising = row.ema5_trend == crate::indicators::Trend::Rising
                    && row.ema8_trend == crate::indicators::Trend::Rising
                    && row.ema21_trend == crate::indicators::Trend::Rising;
                if !rising {
                    return failed(Gate::Trend);
                }
                let fomo_ceiling = columns.ema8
                    * (1.0 + self.settings.fomo_filter * columns.atr / bar.close);
                if bar.close > fomo_ceiling {
                    return failed(Gate::FomoFilter);
                }
                if (bar.high - bar.low) > self.settings.volatility_filter * columns.atr {
                    return failed(Gate::VolatilityFilter);
                }
                let Some(htf) = htf else {
                    return failed(Gate::HigherTimeframe);
                };
                let confirmed = match (htf.row.ema5, htf.row.ema8) {
                    (Some(htf_ema5), Some(htf_ema8)) => {
                        htf_ema5 > htf_ema8 && bar.close > htf.close && bar.close > htf.open
                    }
                    _ => false,
                };
                if !confirmed {
                    return failed(Gate::HigherTimeframe);
                }
            }
            Direction::Short => {
                if !(bar.close < columns.ema8 && bar.close < columns.ema21) {
                    return failed(Gate::PolarFormation);
                }
                if !(columns.ema5 > columns.atr_short_line) {
                    return failed(Gate::EmaPositioning);
                }
                let falling = row.ema5_trend == crate::indicators::Trend::Falling
                    && row.ema8_trend == crate::indicators::Trend::Falling
                    && row.ema21_trend == crate::indicators::Trend::Falling;
                if !falling {
                    return failed(Gate::Trend);
                }
                let fomo_floor = columns.ema8
                    * (1.0 - self.settings.fomo_filter * columns.atr / bar.close);
                if bar.close < fomo_floor {
                    return failed(Gate::FomoFilter);
                }
                if (bar.high - bar.low) > self.settings.volatility_filter * columns.atr {
                    return failed(Gate::VolatilityFilter);
                }
                let Some(htf) = htf else {
                    return failed(Gate::HigherTimeframe);
                };
                let confirmed = match (htf.row.ema5, htf.row.ema8) {
                    (Some(htf_ema5), Some(htf_ema8)) => {
                        htf_ema5 < htf_ema8 && bar.close < htf.close && bar.close < htf.open
                    }
                    _ => false,
                };
                if !confirmed {
                    return failed(Gate::HigherTimeframe);
                }
            }
        }

        let confidence = self.confidence(row);
        debug!(symbol = %symbol, direction = ?direction, confidence, "signal gates all passed");

        Evaluation::Signal(Signal {
            symbol: symbol.clone(),
            direction,
            ts: bar.ts,
            price: bar.close,
            indicators: *row,
            confidence,
        })
    }

    /// Mean slope strength over the trend-gated EMAs, each capped at 2x its
    /// threshold so a single runaway slope cannot saturate the score alone.
    fn confidence(&self, row: &IndicatorRow) -> f64 {
        let components = [
            (row.ema5_slope, self.settings.ema5_rising_threshold),
            (row.ema8_slope, self.settings.ema8_rising_threshold),
            (row.ema21_slope, self.settings.ema21_rising_threshold),
        ];

        let sum: f64 = components
            .iter()
            .map(|(slope, threshold)| match slope {
                Some(slope) if *threshold > 0.0 => (slope.abs() / threshold).min(2.0) / 2.0,
                Some(_) => 1.0,
                None => 0.0,
            })
            .sum();
        sum / components.len() as f64
    }
}
