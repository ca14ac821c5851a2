use serde::{Deserialize, Serialize};

use crate::{Bar, BarDefect, ScanError, Series, ZonedDateTime};

const COMPLETENESS_WEIGHT: f64 = 0.5;
const INTEGRITY_WEIGHT: f64 = 0.5;

/// Volume above this multiple of the trailing average is flagged, not dropped.
const VOLUME_SPIKE_RATIO: f64 = 10.0;
const TRAILING_VOLUME_WINDOW: usize = 20;

/// A single data-quality finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "issue")]
pub enum QualityIssue {
    DroppedRow {
        ts: ZonedDateTime,
        defect: BarDefect,
    },
    VolumeSpike {
        ts: ZonedDateTime,
        ratio: f64,
    },
}

/// Cleaned series plus the findings that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub series: Series,
    pub issues: Vec<QualityIssue>,
    pub quality_score: f64,
}

/// Validate OHLCV integrity and produce a cleaned series.
///
/// Rows violating the price invariants are dropped, never corrected. Volume
/// spikes are flagged but kept. The minimum-bar gate runs here, before any
/// indicator work is attempted.
pub fn validate(series: &Series) -> Result<ValidationReport, ScanError> {
    let total_rows = series.len();
    let mut issues = Vec::new();
    let mut kept: Vec<Bar> = Vec::with_capacity(total_rows);

    for bar in &series.bars {
        match bar.integrity() {
            Some(defect) => issues.push(QualityIssue::DroppedRow { ts: bar.ts, defect }),
            None => kept.push(*bar),
        }
    }

    flag_volume_spikes(&kept, &mut issues);

    let integrity = if total_rows == 0 {
        0.0
    } else {
        kept.len() as f64 / total_rows as f64
    };
    let completeness = completeness(&kept, series.interval.bucket_seconds());
    let quality_score =
        (COMPLETENESS_WEIGHT * completeness + INTEGRITY_WEIGHT * integrity).clamp(0.0, 1.0);

    let min_bars = series.interval.min_bars();
    if kept.len() < min_bars {
        return Err(ScanError::insufficient_bars(format!(
            "{} valid {} bars for '{}', need at least {}",
            kept.len(),
            series.interval,
            series.symbol,
            min_bars,
        )));
    }

    let cleaned = Series::new(series.symbol.clone(), series.interval, kept)
        .map_err(|e| ScanError::invalid_ohlc(e.to_string()))?;

    Ok(ValidationReport {
        series: cleaned,
        issues,
        quality_score,
    })
}

fn flag_volume_spikes(bars: &[Bar], issues: &mut Vec<QualityIssue>) {
    for i in 1..bars.len() {
        let window_start = i.saturating_sub(TRAILING_VOLUME_WINDOW);
        let trailing = &bars[window_start..i];
        let sum: u64 = trailing.iter().map(|b| b.volume).sum();
        let avg = sum as f64 / trailing.len() as f64;
        if avg > 0.0 {
            let ratio = bars[i].volume as f64 / avg;
            if ratio > VOLUME_SPIKE_RATIO {
                issues.push(QualityIssue::VolumeSpike {
                    ts: bars[i].ts,
                    ratio,
                });
            }
        }
    }
}

/// Bars present over bars expected, with expectations computed per trading
/// day so overnight session gaps are not counted as missing data.
fn completeness(bars: &[Bar], bucket_seconds: i64) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }

    let mut expected: i64 = 0;
    let mut day_first = bars[0].ts;
    let mut day_last = bars[0].ts;

    for bar in &bars[1..] {
        if bar.ts.date() == day_first.date() {
            day_last = bar.ts;
        } else {
            expected += (day_last.since(day_first).whole_seconds() / bucket_seconds) + 1;
            day_first = bar.ts;
            day_last = bar.ts;
        }
    }
    expected += (day_last.since(day_first).whole_seconds() / bucket_seconds) + 1;

    if expected <= 0 {
        return 0.0;
    }
    (bars.len() as f64 / expected as f64).clamp(0.0, 1.0)
}
