//! Per-ticker output tables.
//!
//! Clean, merged and feature tables are rendered to string cells here and
//! published atomically through `ohlcv_ingestion::table`.

use std::path::{Path, PathBuf};

use ohlcv_core::config::PathsConfig;
use ohlcv_core::{CleanRow, CleanSeries, MergedSeries, Result, SentimentColumn, SentimentValues, DATE_FORMAT};
use ohlcv_features::{FeatureTable, IndicatorRow};
use ohlcv_ingestion::table::{publish_csv, remove_stale};

/// Clean table columns.
pub const CLEAN_HEADERS: [&str; 11] = [
    "Date",
    "Open",
    "High",
    "Low",
    "RawClose",
    "AdjClose",
    "Volume",
    "Return",
    "LogReturn",
    "Volatility",
    "RSI_14",
];

/// Ticker column added by the merge stage.
pub const TICKER_HEADER: &str = "Ticker";

/// Where each ticker's artifacts live.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    clean_dir: PathBuf,
    merged_dir: PathBuf,
    feature_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            clean_dir: paths.clean_dir.clone(),
            merged_dir: paths.merged_dir.clone(),
            feature_dir: paths.feature_dir.clone(),
        }
    }

    pub fn clean(&self, ticker: &str) -> PathBuf {
        self.clean_dir.join(format!("{ticker}.csv"))
    }

    pub fn merged(&self, ticker: &str) -> PathBuf {
        self.merged_dir.join(format!("{ticker}_merged.csv"))
    }

    pub fn features(&self, ticker: &str) -> PathBuf {
        self.feature_dir.join(format!("{ticker}_features.csv"))
    }

    /// Remove every published artifact for a ticker. Returns how many existed.
    pub fn remove_all(&self, ticker: &str) -> Result<usize> {
        let mut removed = 0;
        for path in [self.clean(ticker), self.merged(ticker), self.features(ticker)] {
            if remove_stale(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Publish a clean table.
pub fn write_clean(path: &Path, series: &CleanSeries) -> Result<()> {
    let headers = CLEAN_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    publish_csv(path, &headers, series.rows.iter().map(clean_cells))
}

/// Publish a merged table: clean columns, ticker, then carried sentiment columns.
pub fn write_merged(path: &Path, series: &MergedSeries) -> Result<()> {
    let headers = merged_headers(&series.columns);
    let rows = series.rows.iter().map(|row| {
        let mut cells = clean_cells(&row.clean);
        cells.push(series.ticker.clone());
        cells.extend(sentiment_cells(row.sentiment.as_ref(), &series.columns));
        cells
    });
    publish_csv(path, &headers, rows)
}

/// Publish a feature table: every input column plus all indicators.
pub fn write_features(path: &Path, table: &FeatureTable) -> Result<()> {
    let columns = table.sentiment_columns();
    let mut headers = if table.has_ticker_column() {
        merged_headers(columns)
    } else {
        CLEAN_HEADERS.iter().map(|h| h.to_string()).collect()
    };
    headers.extend(IndicatorRow::HEADERS.iter().map(|h| h.to_string()));

    let rows = table.rows().into_iter().map(|row| {
        let mut cells = clean_cells(row.clean);
        if let Some(ticker) = row.ticker {
            cells.push(ticker.to_string());
            cells.extend(sentiment_cells(row.sentiment, columns));
        }
        cells.extend(indicator_cells(row.indicators));
        cells
    });
    publish_csv(path, &headers, rows)
}

fn merged_headers(columns: &[SentimentColumn]) -> Vec<String> {
    CLEAN_HEADERS
        .iter()
        .copied()
        .chain(std::iter::once(TICKER_HEADER))
        .chain(columns.iter().map(|c| c.header()))
        .map(String::from)
        .collect()
}

fn clean_cells(row: &CleanRow) -> Vec<String> {
    let bar = &row.bar;
    vec![
        bar.date.format(DATE_FORMAT).to_string(),
        num(bar.open),
        num(bar.high),
        num(bar.low),
        num(bar.raw_close),
        num(bar.adj_close),
        bar.volume.to_string(),
        num(row.ret),
        num(row.log_return),
        num(row.volatility),
        num(row.rsi_14),
    ]
}

fn sentiment_cells(values: Option<&SentimentValues>, columns: &[SentimentColumn]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            let Some(v) = values else {
                return String::new();
            };
            match column {
                SentimentColumn::Score => opt(v.score.map(num)),
                SentimentColumn::KeywordCount => opt(v.keyword_count.map(|c| c.to_string())),
                SentimentColumn::Headline => v.headline.clone().unwrap_or_default(),
                SentimentColumn::Url => v.url.clone().unwrap_or_default(),
            }
        })
        .collect()
}

fn indicator_cells(ind: &IndicatorRow) -> Vec<String> {
    vec![
        ind.volume_today.to_string(),
        num(ind.value_today),
        opt(ind.volume_ratio_3m.map(num)),
        opt(ind.volume_change_pct.map(num)),
        opt(ind.price_change_pct.map(num)),
        opt(ind.intraday_range_pct.map(num)),
        opt(ind.gap_open_pct.map(num)),
        ind.candle_type.as_str().to_string(),
        opt(ind.ma5.map(num)),
        opt(ind.ma20.map(num)),
        opt(ind.ma60.map(num)),
        opt(ind.ma5_cross_ma20.map(|b| b.to_string())),
        opt(ind.price_above_ma60.map(|b| b.to_string())),
        opt(ind.ma_alignment_score.map(|s| s.to_string())),
        opt(ind.atr_14.map(num)),
        opt(ind.bollinger_band_width.map(num)),
        opt(ind.volatility_spike.map(|b| b.to_string())),
        opt(ind.rsi_14.map(num)),
        num(ind.macd),
        num(ind.macd_signal_diff),
        opt(ind.stochastic_k.map(num)),
    ]
}

/// Shortest round-trip representation.
#[inline]
fn num(v: f64) -> String {
    v.to_string()
}

/// Null renders as an empty cell.
#[inline]
fn opt(v: Option<String>) -> String {
    v.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ohlcv_core::{InputSource, MergedRow, OhlcvRecord};
    use ohlcv_features::FeatureEngine;
    use ohlcv_ingestion::table::read_table;

    fn series(n: usize) -> CleanSeries {
        CleanSeries::new(
            (0..n)
                .map(|i| {
                    let close = 100.0 + i as f64;
                    let bar = OhlcvRecord {
                        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                        open: close - 0.5,
                        high: close + 1.0,
                        low: close - 1.0,
                        raw_close: close,
                        adj_close: close,
                        volume: 1000,
                    };
                    CleanRow {
                        bar,
                        ret: 0.01,
                        log_return: 0.01,
                        volatility: 2.0,
                        rsi_14: 0.0,
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn test_clean_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAA.csv");
        write_clean(&path, &series(3)).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, CLEAN_HEADERS.to_vec());
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, 0), Some("2024-01-01"));
        assert_eq!(table.cell(0, 5), Some("100"));
        assert_eq!(table.cell(0, 6), Some("1000"));
    }

    #[test]
    fn test_merged_table_nulls_unmatched() {
        let clean = series(2);
        let mut merged = MergedSeries::clean_only("AAA", &clean);
        merged.columns = vec![SentimentColumn::Score, SentimentColumn::Headline];
        merged.rows[1] = MergedRow {
            clean: clean.rows[1].clone(),
            sentiment: Some(SentimentValues {
                score: Some(-0.25),
                headline: Some("AAA beats".to_string()),
                ..Default::default()
            }),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAA_merged.csv");
        write_merged(&path, &merged).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(&table.headers[11..], &["Ticker", "news_sentiment_score", "title"]);
        assert_eq!(&table.rows[0][11..], &["AAA", "", ""]);
        assert_eq!(&table.rows[1][11..], &["AAA", "-0.25", "AAA beats"]);
    }

    #[test]
    fn test_feature_table_layout() {
        let engine = FeatureEngine::new(&Default::default());
        let features = engine.compute(InputSource::Clean(series(70))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAA_features.csv");
        write_features(&path, &features).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers.len(), CLEAN_HEADERS.len() + IndicatorRow::HEADERS.len());
        assert!(!table.has_column(TICKER_HEADER));
        assert_eq!(table.len(), 70);

        let ma60 = table.column_index("ma60").unwrap();
        assert_eq!(table.cell(0, ma60), Some(""));
        assert!(!table.cell(69, ma60).unwrap().is_empty());
        let candle = table.column_index("candle_type").unwrap();
        assert_eq!(table.cell(0, candle), Some("bullish"));
    }

    #[test]
    fn test_remove_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(&PathsConfig {
            clean_dir: dir.path().join("clean"),
            merged_dir: dir.path().join("merged"),
            feature_dir: dir.path().join("features"),
            ..Default::default()
        });
        write_clean(&paths.clean("AAA"), &series(2)).unwrap();
        assert_eq!(paths.remove_all("AAA").unwrap(), 1);
        assert_eq!(paths.remove_all("AAA").unwrap(), 0);
    }
}
