//! Feature computation engine.
//!
//! Combines all indicator groups into one row per input date. Pure and
//! deterministic: the same series always produces the same table.

use ohlcv_core::config::FeatureConfig;
use ohlcv_core::rolling::rolling_mean;
use ohlcv_core::{
    CandleType, CleanRow, InputSource, OhlcvRecord, SentimentColumn, SentimentValues,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::momentum::{macd, rsi_series, stochastic_k};
use crate::volatility::{atr_proxy, bollinger_width, volatility_spikes};

/// Indicator values for one date. `None` marks warm-up or a zero denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    // Volume
    pub volume_today: u64,
    pub value_today: f64,
    pub volume_ratio_3m: Option<f64>,
    pub volume_change_pct: Option<f64>,
    // Price structure
    pub price_change_pct: Option<f64>,
    pub intraday_range_pct: Option<f64>,
    pub gap_open_pct: Option<f64>,
    pub candle_type: CandleType,
    // Moving averages
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma5_cross_ma20: Option<bool>,
    pub price_above_ma60: Option<bool>,
    pub ma_alignment_score: Option<u8>,
    // Volatility
    pub atr_14: Option<f64>,
    pub bollinger_band_width: Option<f64>,
    pub volatility_spike: Option<bool>,
    // Momentum
    pub rsi_14: Option<f64>,
    pub macd: f64,
    pub macd_signal_diff: f64,
    pub stochastic_k: Option<f64>,
}

impl IndicatorRow {
    /// Column names in output order.
    pub const HEADERS: [&'static str; 21] = [
        "volume_today",
        "value_today",
        "volume_ratio_3m",
        "volume_change_pct",
        "price_change_pct",
        "intraday_range_pct",
        "gap_open_pct",
        "candle_type",
        "ma5",
        "ma20",
        "ma60",
        "ma5_cross_ma20",
        "price_above_ma60",
        "ma_alignment_score",
        "atr_14",
        "bollinger_band_width",
        "volatility_spike",
        "rsi_14",
        "macd",
        "macd_signal_diff",
        "stochastic_k",
    ];
}

/// One output row: the input row's columns plus its indicators.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRow<'a> {
    pub clean: &'a CleanRow,
    /// Ticker column, present when the source was a merged series.
    pub ticker: Option<&'a str>,
    pub sentiment: Option<&'a SentimentValues>,
    pub indicators: &'a IndicatorRow,
}

/// Input series with an indicator row per date.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    /// The series the features were computed from; never `Missing`.
    source: InputSource,
    indicators: Vec<IndicatorRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Which kind of series was used.
    pub fn source_kind(&self) -> &'static str {
        self.source.kind()
    }

    /// Sentiment columns carried from a merged source.
    pub fn sentiment_columns(&self) -> &[SentimentColumn] {
        match &self.source {
            InputSource::Merged(m) => &m.columns,
            _ => &[],
        }
    }

    /// Whether the output carries a ticker column.
    pub fn has_ticker_column(&self) -> bool {
        matches!(self.source, InputSource::Merged(_))
    }

    pub fn indicators(&self) -> &[IndicatorRow] {
        &self.indicators
    }

    /// Rows in date order.
    pub fn rows(&self) -> Vec<FeatureRow<'_>> {
        match &self.source {
            InputSource::Merged(m) => m
                .rows
                .iter()
                .zip(&self.indicators)
                .map(|(row, ind)| FeatureRow {
                    clean: &row.clean,
                    ticker: Some(m.ticker.as_str()),
                    sentiment: row.sentiment.as_ref(),
                    indicators: ind,
                })
                .collect(),
            InputSource::Clean(c) => c
                .rows
                .iter()
                .zip(&self.indicators)
                .map(|(row, ind)| FeatureRow {
                    clean: row,
                    ticker: None,
                    sentiment: None,
                    indicators: ind,
                })
                .collect(),
            InputSource::Missing => Vec::new(),
        }
    }
}

/// Feature computation engine.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
}

impl FeatureEngine {
    /// Create a new feature engine from configuration.
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Compute the feature table for a resolved source.
    ///
    /// Returns `None` for [`InputSource::Missing`]; that is a skip, not a failure.
    pub fn compute(&self, source: InputSource) -> Option<FeatureTable> {
        if matches!(source, InputSource::Missing) {
            return None;
        }
        let indicators = self.compute_indicators(&source.records());
        debug!(
            source = source.kind(),
            rows = indicators.len(),
            ready = self.is_ready(indicators.len()),
            "features computed"
        );
        Some(FeatureTable { source, indicators })
    }

    /// Indicator rows for a date-ordered series; one row per bar.
    pub fn compute_indicators(&self, bars: &[OhlcvRecord]) -> Vec<IndicatorRow> {
        let cfg = &self.config;
        let closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        let ranges: Vec<f64> = bars.iter().map(|b| b.range()).collect();

        let volume_mean = rolling_mean(&volumes, cfg.volume_window);
        let ma5 = rolling_mean(&closes, cfg.ma_short);
        let ma20 = rolling_mean(&closes, cfg.ma_medium);
        let ma60 = rolling_mean(&closes, cfg.ma_long);

        let range_pct: Vec<Option<f64>> = bars
            .iter()
            .map(|b| ratio(b.range(), b.adj_close).map(|r| r * 100.0))
            .collect();
        let atr = atr_proxy(&ranges, cfg.atr_window);
        let width = bollinger_width(&closes, cfg.bollinger_window);
        let spikes = volatility_spikes(&range_pct, cfg.spike_window, cfg.spike_factor);

        let rsi = rsi_series(&closes, cfg.rsi_window);
        let macd = macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let stoch = stochastic_k(&closes, &highs, &lows, cfg.stochastic_window);

        bars.iter()
            .enumerate()
            .map(|(t, bar)| {
                let prev = t.checked_sub(1).map(|p| &bars[p]);
                let close = bar.adj_close;

                IndicatorRow {
                    volume_today: bar.volume,
                    value_today: close * bar.volume as f64,
                    volume_ratio_3m: volume_mean[t].and_then(|m| ratio(volumes[t], m)),
                    volume_change_pct: prev
                        .and_then(|p| ratio(volumes[t], p.volume as f64))
                        .map(|r| (r - 1.0) * 100.0),
                    price_change_pct: prev
                        .and_then(|p| ratio(close, p.adj_close))
                        .map(|r| (r - 1.0) * 100.0),
                    intraday_range_pct: range_pct[t],
                    gap_open_pct: prev
                        .and_then(|p| ratio(bar.open - p.adj_close, p.adj_close))
                        .map(|r| r * 100.0),
                    candle_type: CandleType::of(bar),
                    ma5: ma5[t],
                    ma20: ma20[t],
                    ma60: ma60[t],
                    ma5_cross_ma20: ma5[t].zip(ma20[t]).map(|(s, m)| s > m),
                    price_above_ma60: ma60[t].map(|l| close > l),
                    ma_alignment_score: match (ma5[t], ma20[t], ma60[t]) {
                        (Some(s), Some(m), Some(l)) => Some(u8::from(close > s && s > m && m > l)),
                        _ => None,
                    },
                    atr_14: atr[t],
                    bollinger_band_width: width[t],
                    volatility_spike: spikes[t],
                    rsi_14: rsi[t],
                    macd: macd.macd[t],
                    macd_signal_diff: macd.signal_diff[t],
                    stochastic_k: stoch[t],
                }
            })
            .collect()
    }

    /// Longest trailing window; a shorter series leaves some indicator all-null.
    pub fn longest_window(&self) -> usize {
        self.config.longest_window()
    }

    /// Check if `rows` observations fill every window at least once.
    pub fn is_ready(&self, rows: usize) -> bool {
        rows >= self.longest_window()
    }
}

/// `num / den`, or `None` when the denominator is zero or the result is not finite.
#[inline]
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    Some(num / den).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use ohlcv_core::{CleanSeries, MergedRow, MergedSeries};

    fn engine() -> FeatureEngine {
        FeatureEngine::new(&FeatureConfig::default())
    }

    fn make_bar(t: usize, close: f64, volume: u64) -> OhlcvRecord {
        OhlcvRecord {
            date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(t as i64),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            raw_close: close,
            adj_close: close,
            volume,
        }
    }

    /// 90 rows, constant volume, strictly increasing close.
    fn rising_bars() -> Vec<OhlcvRecord> {
        (0..90).map(|t| make_bar(t, 100.0 + t as f64, 1000)).collect()
    }

    fn clean_of(bars: &[OhlcvRecord]) -> CleanSeries {
        CleanSeries::new(
            bars.iter()
                .map(|b| CleanRow {
                    bar: *b,
                    ret: 0.0,
                    log_return: 0.0,
                    volatility: b.range(),
                    rsi_14: 50.0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_rising_series_last_row() {
        let bars = rising_bars();
        let rows = engine().compute_indicators(&bars);
        assert_eq!(rows.len(), 90);
        let last = &rows[89];

        let expected_ma5 = bars[85..].iter().map(|b| b.adj_close).sum::<f64>() / 5.0;
        assert_eq!(last.ma5, Some(expected_ma5));

        // All changes positive: avg_down = 0 maps to rs = 0, so RSI is 0, not 100.
        assert_eq!(last.rsi_14, Some(0.0));

        assert_relative_eq!(last.volume_ratio_3m.unwrap(), 1.0);
        assert_relative_eq!(last.volume_change_pct.unwrap(), 0.0);
        assert_eq!(last.volume_today, 1000);
        assert_relative_eq!(last.value_today, 189.0 * 1000.0);
        assert_eq!(last.ma5_cross_ma20, Some(true));
        assert_eq!(last.price_above_ma60, Some(true));
        assert_eq!(last.ma_alignment_score, Some(1));
        assert_eq!(last.candle_type, CandleType::Bullish);
        assert!(last.macd > 0.0);
    }

    #[test]
    fn test_warmup_is_null_not_dropped() {
        let rows = engine().compute_indicators(&rising_bars());
        let first = &rows[0];
        assert!(first.price_change_pct.is_none());
        assert!(first.gap_open_pct.is_none());
        assert!(first.volume_change_pct.is_none());
        assert!(first.intraday_range_pct.is_some());

        assert!(rows[3].ma5.is_none());
        assert!(rows[4].ma5.is_some());
        assert!(rows[58].ma60.is_none());
        assert!(rows[58].ma_alignment_score.is_none());
        assert!(rows[59].ma60.is_some());
        assert!(rows[12].atr_14.is_none());
        assert!(rows[13].atr_14.is_some());
        assert!(rows[13].rsi_14.is_none());
        assert!(rows[14].rsi_14.is_some());
        assert!(rows[61].volume_ratio_3m.is_none());
        assert!(rows[62].volume_ratio_3m.is_some());
    }

    #[test]
    fn test_price_structure_values() {
        let bars = vec![make_bar(0, 100.0, 1000), make_bar(1, 110.0, 1500)];
        let rows = engine().compute_indicators(&bars);
        let r = &rows[1];
        assert_relative_eq!(r.price_change_pct.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(r.volume_change_pct.unwrap(), 50.0, epsilon = 1e-9);
        // Open 109.5 vs prior close 100
        assert_relative_eq!(r.gap_open_pct.unwrap(), 9.5, epsilon = 1e-9);
        assert_relative_eq!(r.intraday_range_pct.unwrap(), 2.0 / 110.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bearish_when_close_not_above_open() {
        let mut bar = make_bar(0, 100.0, 10);
        bar.open = 100.0;
        let rows = engine().compute_indicators(&[bar]);
        assert_eq!(rows[0].candle_type, CandleType::Bearish);
    }

    #[test]
    fn test_rsi_within_bounds() {
        let bars: Vec<OhlcvRecord> = (0..120)
            .map(|t| make_bar(t, 100.0 + ((t * 7) % 13) as f64, 1000 + (t as u64 % 5) * 100))
            .collect();
        for row in engine().compute_indicators(&bars) {
            if let Some(v) = row.rsi_14 {
                assert!((0.0..=100.0).contains(&v));
            }
            if let Some(k) = row.stochastic_k {
                assert!((0.0..=100.0).contains(&k));
            }
        }
    }

    #[test]
    fn test_missing_source_is_skip() {
        assert!(engine().compute(InputSource::Missing).is_none());
    }

    #[test]
    fn test_merged_source_rows() {
        let bars = rising_bars();
        let clean = clean_of(&bars);
        let mut merged = MergedSeries::clean_only("ABC", &clean);
        merged.columns = vec![SentimentColumn::Score];
        merged.rows[10] = MergedRow {
            clean: clean.rows[10].clone(),
            sentiment: Some(SentimentValues {
                score: Some(0.7),
                ..Default::default()
            }),
        };

        let table = engine().compute(InputSource::Merged(merged)).unwrap();
        assert_eq!(table.len(), 90);
        assert_eq!(table.source_kind(), "merged");
        assert!(table.has_ticker_column());
        assert_eq!(table.sentiment_columns(), &[SentimentColumn::Score]);

        let rows = table.rows();
        assert_eq!(rows[10].ticker, Some("ABC"));
        assert_eq!(rows[10].sentiment.unwrap().score, Some(0.7));
        assert!(rows[11].sentiment.is_none());
    }

    #[test]
    fn test_clean_source_matches_direct_computation() {
        let bars = rising_bars();
        let table = engine().compute(InputSource::Clean(clean_of(&bars))).unwrap();
        assert!(!table.has_ticker_column());
        assert!(table.sentiment_columns().is_empty());
        assert_eq!(table.indicators(), engine().compute_indicators(&bars).as_slice());
    }

    #[test]
    fn test_readiness() {
        let e = engine();
        assert_eq!(e.longest_window(), 63);
        assert!(!e.is_ready(62));
        assert!(e.is_ready(63));
    }
}
