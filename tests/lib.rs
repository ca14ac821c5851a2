//! Shared fixtures for the behavior suites.

use tickscan_core::{Bar, Interval, Series, Symbol, ZonedDateTime};

pub fn symbol(name: &str) -> Symbol {
    Symbol::parse(name).expect("fixture symbol must parse")
}

pub fn ts(input: &str) -> ZonedDateTime {
    ZonedDateTime::parse(input).expect("fixture timestamp must parse")
}

/// A clean one-minute series of `len` bars ending at `last`, with closes
/// stepping up by `step` per bar.
pub fn minute_series_ending_at(
    name: &str,
    len: usize,
    last: ZonedDateTime,
    base: f64,
    step: f64,
) -> Series {
    let bars = (0..len)
        .map(|i| {
            let bar_ts = ZonedDateTime::from_offset_datetime(
                last.into_inner() - time::Duration::minutes((len - 1 - i) as i64),
            );
            let close = base + step * i as f64;
            Bar::new(
                bar_ts,
                close - step.abs() / 2.0 - 0.01,
                close + 0.02,
                close - step.abs() - 0.02,
                close,
                1_000,
            )
            .expect("fixture bar must be valid")
        })
        .collect();
    Series::new(symbol(name), Interval::OneMinute, bars).expect("fixture series must be ordered")
}

/// A clean series ending at the current minute; staleness checks pass no
/// matter when the suite runs.
pub fn fresh_series(name: &str, len: usize) -> Series {
    minute_series_ending_at(name, len, ZonedDateTime::now_utc(), 100.0, 0.01)
}
