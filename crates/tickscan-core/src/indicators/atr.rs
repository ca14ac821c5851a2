//! Average true range.
//!
//! TR[i] = max(high-low, |high-prev_close|, |low-prev_close|); ATR(n) is the
//! plain rolling mean of the last n true ranges. TR needs a previous close,
//! so the first valid ATR lands at index n.

use crate::Bar;

pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return values;
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect();

    let mut window_sum: f64 = true_ranges[..period].iter().sum();
    values[period] = Some(window_sum / period as f64);

    for i in (period + 1)..bars.len() {
        window_sum += true_ranges[i - 1] - true_ranges[i - 1 - period];
        values[i] = Some(window_sum / period as f64);
    }

    values
}
