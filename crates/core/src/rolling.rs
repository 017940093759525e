//! Trailing-window primitives shared by the cleaner and the indicator engine.
//!
//! Windows are trailing and include the current observation. A window reports
//! nothing until it holds `window` observations.

use std::collections::VecDeque;

use statrs::statistics::Statistics;

/// Fixed-length trailing window over f64 observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Window size in observations.
    window: usize,
    /// Most recent observations, oldest first.
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new window of `window` observations.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Add an observation, evicting the oldest once full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.window > 0 && self.values.len() >= self.window
    }

    /// Arithmetic mean of a full window.
    ///
    /// Summed fresh on every call so results do not drift with series length.
    pub fn mean(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    /// Minimum of a full window.
    pub fn min(&self) -> Option<f64> {
        self.is_ready().then(|| Statistics::min(self.values.iter()))
    }

    /// Maximum of a full window.
    pub fn max(&self) -> Option<f64> {
        self.is_ready().then(|| Statistics::max(self.values.iter()))
    }
}

/// Trailing mean of `values` at every index; `None` during warm-up.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut roll = RollingWindow::new(window);
    values
        .iter()
        .map(|v| {
            roll.push(*v);
            roll.mean()
        })
        .collect()
}

/// Relative strength index over trailing simple means of gains and losses.
///
/// The first index has no prior price and yields `None`; the first defined value
/// is at index `period`, once `period` price changes are available. A window with
/// no losses maps to `rs = 0`, so the result is always finite and within [0, 100].
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = RollingWindow::new(period);
    let mut losses = RollingWindow::new(period);
    let mut out = Vec::with_capacity(prices.len());
    let mut prev: Option<f64> = None;

    for &price in prices {
        let value = match prev {
            Some(p) => {
                let delta = price - p;
                gains.push(delta.max(0.0));
                losses.push((-delta).max(0.0));
                match (gains.mean(), losses.mean()) {
                    (Some(avg_up), Some(avg_down)) => Some(rsi_from_averages(avg_up, avg_down)),
                    _ => None,
                }
            }
            None => None,
        };
        out.push(value);
        prev = Some(price);
    }
    out
}

/// `100 - 100 / (1 + rs)` with `rs = 0` when there were no losses.
#[inline]
pub fn rsi_from_averages(avg_up: f64, avg_down: f64) -> f64 {
    let rs = if avg_down == 0.0 { 0.0 } else { avg_up / avg_down };
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_not_ready() {
        let mut roll = RollingWindow::new(3);
        roll.push(1.0);
        roll.push(2.0);
        assert!(!roll.is_ready());
        assert!(roll.mean().is_none());
        assert!(roll.max().is_none());
    }

    #[test]
    fn test_rolling_window_evicts_oldest() {
        let mut roll = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 10.0] {
            roll.push(v);
        }
        assert_relative_eq!(roll.mean().unwrap(), 5.0);
        assert_relative_eq!(roll.min().unwrap(), 2.0);
        assert_relative_eq!(roll.max().unwrap(), 10.0);
    }

    #[test]
    fn test_rolling_mean_warmup() {
        let means = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(means, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_rsi_warmup_length() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let rsi = rsi_series(&prices, 14);
        assert!(rsi[..14].iter().all(Option::is_none));
        assert!(rsi[14..].iter().all(Option::is_some));
    }

    #[test]
    fn test_rsi_no_losses_maps_to_zero() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_series(&prices, 14);
        assert_relative_eq!(rsi[29].unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_known_value() {
        // Alternating +2 / -1 over 4 changes: avg_up = 1.0, avg_down = 0.5, rs = 2
        let prices = [10.0, 12.0, 11.0, 13.0, 12.0];
        let rsi = rsi_series(&prices, 4);
        assert_relative_eq!(rsi[4].unwrap(), 100.0 - 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rsi_bounds() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + ((i * 37) % 11) as f64 - 5.0)
            .collect();
        for v in rsi_series(&prices, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
