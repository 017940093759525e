//! Momentum indicators: EMA, MACD, stochastic %K.
//!
//! RSI lives in `ohlcv_core::rolling` because the cleaner shares it.

use ohlcv_core::rolling::RollingWindow;

pub use ohlcv_core::rolling::rsi_series;

/// Exponential moving average with bias-adjusted weights.
///
/// The value at step `t` is `sum(w_i * x_{t-i}) / sum(w_i)` with
/// `w_i = (1 - alpha)^i` and `alpha = 2 / (span + 1)`. Defined from the first
/// observation on.
#[derive(Debug, Clone)]
pub struct Ema {
    /// Decay per step, `1 - alpha`.
    decay: f64,
    /// Weighted sum of observations.
    numerator: f64,
    /// Sum of weights.
    denominator: f64,
}

impl Ema {
    /// Create a new EMA with the given span.
    pub fn new(span: usize) -> Self {
        let alpha = 2.0 / (span as f64 + 1.0);
        Self {
            decay: 1.0 - alpha,
            numerator: 0.0,
            denominator: 0.0,
        }
    }

    /// Add an observation and return the updated average.
    pub fn update(&mut self, value: f64) -> f64 {
        self.numerator = value + self.decay * self.numerator;
        self.denominator = 1.0 + self.decay * self.denominator;
        self.numerator / self.denominator
    }
}

/// EMA of `values` at every index.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut ema = Ema::new(span);
    values.iter().map(|v| ema.update(*v)).collect()
}

/// MACD line and its distance from the signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    /// Fast EMA minus slow EMA.
    pub macd: Vec<f64>,
    /// MACD minus its signal EMA.
    pub signal_diff: Vec<f64>,
}

/// Compute MACD over adjusted closes.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_ema = ema_series(&line, signal);
    let signal_diff = line.iter().zip(&signal_ema).map(|(m, s)| m - s).collect();
    Macd {
        macd: line,
        signal_diff,
    }
}

/// Stochastic %K: where the close sits inside the trailing high/low range.
///
/// `None` during warm-up and when the range is zero.
pub fn stochastic_k(closes: &[f64], highs: &[f64], lows: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut high_roll = RollingWindow::new(window);
    let mut low_roll = RollingWindow::new(window);

    closes
        .iter()
        .zip(highs.iter().zip(lows))
        .map(|(&close, (&high, &low))| {
            high_roll.push(high);
            low_roll.push(low);
            let (hh, ll) = (high_roll.max()?, low_roll.min()?);
            let span = hh - ll;
            if span == 0.0 {
                return None;
            }
            Some((close - ll) / span * 100.0)
        })
        .collect()
}
