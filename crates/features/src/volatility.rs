//! Rolling volatility indicators.
//!
//! ATR proxy (mean high-low range), Bollinger width (normalized max-min spread)
//! and the intraday-range spike flag.

use ohlcv_core::rolling::{rolling_mean, RollingWindow};

/// Trailing mean of the high-low range.
pub fn atr_proxy(ranges: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_mean(ranges, window)
}

/// `(max - min) / mean` of closes over the window. `None` when the mean is zero.
pub fn bollinger_width(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut roll = RollingWindow::new(window);
    closes
        .iter()
        .map(|&c| {
            roll.push(c);
            let (hi, lo, mean) = (roll.max()?, roll.min()?, roll.mean()?);
            if mean == 0.0 {
                None
            } else {
                Some((hi - lo) / mean)
            }
        })
        .collect()
}

/// Whether today's range exceeds `factor` times the trailing mean range
/// (today included).
///
/// An undefined range anywhere in the window makes the flag undefined.
pub fn volatility_spikes(range_pct: &[Option<f64>], window: usize, factor: f64) -> Vec<Option<bool>> {
    let mut roll = RollingWindow::new(window);
    range_pct
        .iter()
        .map(|r| {
            roll.push(r.unwrap_or(f64::NAN));
            let mean = roll.mean().filter(|m| m.is_finite())?;
            let today = (*r)?;
            Some(today > factor * mean)
        })
        .collect()
}
