//! Closed-form technical indicator recurrences.
//!
//! Every function returns a series aligned with its input; positions before
//! the indicator has enough history hold NaN. The pipeline coerces
//! non-finite values to 0.0 and raises its warmup flag, so callers here get
//! the honest series.

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for idx in period.saturating_sub(1)..values.len() {
        let window = &values[idx + 1 - period..=idx];
        out[idx] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Exponential moving average seeded from the first value
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.is_empty() {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut current = values[0];
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            current = alpha * value + (1.0 - alpha) * current;
        }
        if idx + 1 >= period {
            out[idx] = current;
        }
    }
    out
}

/// Relative strength index using mean gain / mean loss over the period
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period + 1 {
        return out;
    }
    let deltas: Vec<f64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
    for idx in period..values.len() {
        let slice = &deltas[idx - period..idx];
        let gain = slice.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let loss = slice.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / period as f64;
        out[idx] = if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        };
    }
    out
}

/// Average true range
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; close.len()];
    if period == 0 || close.len() < period + 1 {
        return out;
    }
    let mut true_ranges = vec![0.0; close.len()];
    true_ranges[0] = high[0] - low[0];
    for idx in 1..close.len() {
        let range = high[idx] - low[idx];
        let up_gap = (high[idx] - close[idx - 1]).abs();
        let down_gap = (low[idx] - close[idx - 1]).abs();
        true_ranges[idx] = range.max(up_gap).max(down_gap);
    }
    for idx in period..close.len() {
        let window = &true_ranges[idx + 1 - period..=idx];
        out[idx] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// MACD line, signal line, and histogram
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    // Signal EMA runs over the zero-filled line so warmup NaNs don't poison it
    let filled: Vec<f64> = line
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect();
    let signal_line = ema(&filled, signal);
    let histogram: Vec<f64> = line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();
    (line, signal_line, histogram)
}

/// Bollinger bands: rolling mean plus/minus `dev` population stddevs
pub fn bbands(values: &[f64], period: usize, dev: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut upper = vec![f64::NAN; values.len()];
    let mut mid = vec![f64::NAN; values.len()];
    let mut lower = vec![f64::NAN; values.len()];
    if period == 0 {
        return (upper, mid, lower);
    }
    for idx in period.saturating_sub(1)..values.len() {
        let window = &values[idx + 1 - period..=idx];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let stddev = variance.sqrt();
        mid[idx] = mean;
        upper[idx] = mean + dev * stddev;
        lower[idx] = mean - dev * stddev;
    }
    (upper, mid, lower)
}

/// Population standard deviation; 0.0 for fewer than two samples
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warms_up_then_averages() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 2.0).abs() < 1e-12);
        assert!((out[4] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn ema_matches_recurrence() {
        let values = [10.0, 11.0, 12.0];
        let out = ema(&values, 2);
        // alpha = 2/3; seeded at 10, then 10.6667, then 11.5556
        assert!(out[0].is_nan());
        assert!((out[1] - (2.0 / 3.0 * 11.0 + 1.0 / 3.0 * 10.0)).abs() < 1e-9);
        assert!(out[2].is_finite());
    }

    #[test]
    fn rsi_is_100_when_only_gains() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&values, 14);
        assert!((out.last().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_short_series_stays_nan() {
        let values = [1.0, 2.0, 3.0];
        assert!(rsi(&values, 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_uses_true_range_against_prior_close() {
        let high = [11.0, 12.0, 15.0];
        let low = [9.0, 10.0, 13.0];
        let close = [10.0, 11.0, 14.0];
        let out = atr(&high, &low, &close, 2);
        // TR = [2, 2, 4]; ATR(2) at idx 2 = (2 + 4) / 2 = 3
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn bbands_bracket_the_mean() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (upper, mid, lower) = bbands(&values, 8, 2.0);
        let m = mid.last().unwrap();
        assert!((m - 5.0).abs() < 1e-12);
        // population stddev of this set is exactly 2
        assert!((upper.last().unwrap() - 9.0).abs() < 1e-12);
        assert!((lower.last().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64).sin()).collect();
        let (line, signal, hist) = macd(&values, 12, 26, 9);
        let last = values.len() - 1;
        assert!((hist[last] - (line[last] - signal[last])).abs() < 1e-9);
    }

    #[test]
    fn population_stddev_handles_degenerate_input() {
        assert_eq!(population_stddev(&[]), 0.0);
        assert_eq!(population_stddev(&[3.0]), 0.0);
        assert!((population_stddev(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
    }
}
