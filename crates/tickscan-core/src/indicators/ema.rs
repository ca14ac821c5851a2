//! Exponential moving average.
//!
//! k = 2/(n+1), seeded with the simple average of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). The first n-1 values are warmup and
//! carry no value.

use crate::Bar;

pub fn ema(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    if period == 0 || bars.is_empty() {
        return vec![None; bars.len()];
    }

    let mut values = Vec::with_capacity(bars.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = 0.0;
    let mut seed_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            seed_sum += bar.close;
            values.push(None);
        } else if i + 1 == period {
            seed_sum += bar.close;
            current = seed_sum / period as f64;
            values.push(Some(current));
        } else {
            current = bar.close * k + current * (1.0 - k);
            values.push(Some(current));
        }
    }

    values
}
