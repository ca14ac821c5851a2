use serde::{Deserialize, Serialize};

/// Slope-based trend classification of an EMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Sideways,
    InsufficientData,
}

const SLOPE_LOOKBACK: usize = 3;

/// Relative slope `EMA_t / EMA_{t-3} - 1`, or `None` when either endpoint is
/// missing, the lookback reaches before the series, or the denominator is
/// exactly zero.
pub fn slope(values: &[Option<f64>], index: usize) -> Option<f64> {
    if index < SLOPE_LOOKBACK || index >= values.len() {
        return None;
    }
    let now = values[index]?;
    let then = values[index - SLOPE_LOOKBACK]?;
    if then == 0.0 {
        return None;
    }
    Some(now / then - 1.0)
}

pub fn classify(values: &[Option<f64>], index: usize, threshold: f64) -> Trend {
    match slope(values, index) {
        None => Trend::InsufficientData,
        Some(slope) if slope >= threshold => Trend::Rising,
        Some(slope) if slope <= -threshold => Trend::Falling,
        Some(_) => Trend::Sideways,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_when_slope_clears_the_threshold() {
        let values = vec![Some(100.0), Some(101.0), Some(102.0), Some(103.0)];
        assert_eq!(classify(&values, 3, 0.02), Trend::Rising);
    }

    #[test]
    fn falling_is_symmetric() {
        let values = vec![Some(103.0), Some(102.0), Some(101.0), Some(100.0)];
        assert_eq!(classify(&values, 3, 0.02), Trend::Falling);
    }

    #[test]
    fn small_slopes_are_sideways() {
        let values = vec![Some(100.0), Some(100.0), Some(100.0), Some(100.1)];
        assert_eq!(classify(&values, 3, 0.02), Trend::Sideways);
    }

    #[test]
    fn strictly_increasing_values_never_classify_falling() {
        let values: Vec<Option<f64>> = (0..30).map(|i| Some(100.0 + i as f64)).collect();
        for index in 0..values.len() {
            assert_ne!(classify(&values, index, 0.005), Trend::Falling);
        }
    }

    #[test]
    fn short_lookback_is_insufficient() {
        let values = vec![Some(100.0), Some(101.0), Some(102.0)];
        assert_eq!(classify(&values, 2, 0.02), Trend::InsufficientData);
    }

    #[test]
    fn warmup_endpoint_is_insufficient() {
        let values = vec![None, Some(101.0), Some(102.0), Some(103.0)];
        assert_eq!(classify(&values, 3, 0.02), Trend::InsufficientData);
    }

    #[test]
    fn zero_denominator_is_insufficient_not_a_panic() {
        let values = vec![Some(0.0), Some(101.0), Some(102.0), Some(103.0)];
        assert_eq!(classify(&values, 3, 0.02), Trend::InsufficientData);
    }
}
