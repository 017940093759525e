//! Core data types for the feature pipeline.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical calendar-date format for every table.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A table as read from disk: header names plus untyped cells.
///
/// Used for raw price tables and for sentiment tables of unknown schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names in file order.
    pub headers: Vec<String>,
    /// Data rows. Rows may be shorter than the header.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Create a table from headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at (row, column); `None` for ragged rows.
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One trading day for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    /// Session date.
    pub date: NaiveDate,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Unadjusted close.
    pub raw_close: f64,
    /// Split/dividend adjusted close.
    pub adj_close: f64,
    /// Shares traded.
    pub volume: u64,
}

impl OhlcvRecord {
    /// High minus low.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// All five price fields strictly positive.
    pub fn has_positive_prices(&self) -> bool {
        [self.open, self.high, self.low, self.raw_close, self.adj_close]
            .iter()
            .all(|p| *p > 0.0)
    }

    /// High bounds open/close/low from above and low bounds open/close from below.
    pub fn is_ohlc_consistent(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.raw_close
            && self.low <= self.open
            && self.low <= self.raw_close
    }
}

/// A cleaned row: the bar plus derived baseline fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRow {
    /// Validated bar.
    pub bar: OhlcvRecord,
    /// Simple return of the adjusted close.
    pub ret: f64,
    /// Log return of the adjusted close.
    pub log_return: f64,
    /// High minus low.
    pub volatility: f64,
    /// 14-period RSI.
    pub rsi_14: f64,
}

/// A validated, de-duplicated, date-ordered series for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanSeries {
    pub rows: Vec<CleanRow>,
}

impl CleanSeries {
    pub fn new(rows: Vec<CleanRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy out the bars in date order.
    pub fn records(&self) -> Vec<OhlcvRecord> {
        self.rows.iter().map(|r| r.bar).collect()
    }

    /// Re-check every clean-series invariant, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        let mut prev: Option<NaiveDate> = None;
        for row in &self.rows {
            let bar = &row.bar;
            if let Some(p) = prev {
                if bar.date <= p {
                    return Err(Error::data_quality(format!(
                        "dates not strictly increasing at {}",
                        bar.date
                    )));
                }
            }
            prev = Some(bar.date);

            if bar.volume == 0 || !bar.has_positive_prices() {
                return Err(Error::data_quality(format!("non-positive field at {}", bar.date)));
            }
            if !bar.is_ohlc_consistent() {
                return Err(Error::data_quality(format!("OHLC inconsistent at {}", bar.date)));
            }
            let derived = [row.ret, row.log_return, row.volatility, row.rsi_14];
            if derived.iter().any(|v| !v.is_finite()) {
                return Err(Error::data_quality(format!("non-finite derived field at {}", bar.date)));
            }
            if !(0.0..=100.0).contains(&row.rsi_14) {
                return Err(Error::data_quality(format!("RSI out of range at {}", bar.date)));
            }
        }
        Ok(())
    }
}

/// Sentiment columns carried into merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentColumn {
    Score,
    KeywordCount,
    Headline,
    Url,
}

impl SentimentColumn {
    /// Allow-list in output order.
    pub const ALL: [SentimentColumn; 4] = [
        SentimentColumn::Score,
        SentimentColumn::KeywordCount,
        SentimentColumn::Headline,
        SentimentColumn::Url,
    ];

    /// Header written to merged and feature tables.
    pub fn header(self) -> &'static str {
        match self {
            SentimentColumn::Score => "news_sentiment_score",
            SentimentColumn::KeywordCount => "positive_keywords_count",
            SentimentColumn::Headline => "title",
            SentimentColumn::Url => "url",
        }
    }
}

/// Sentiment values joined onto one price row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentValues {
    pub score: Option<f64>,
    pub keyword_count: Option<u64>,
    pub headline: Option<String>,
    pub url: Option<String>,
}

/// A clean row with its matched sentiment, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub clean: CleanRow,
    /// `None` when no sentiment row matched this date.
    pub sentiment: Option<SentimentValues>,
}

/// Clean series left-joined with sentiment. Always as long as its clean series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSeries {
    /// Value of the added `Ticker` column.
    pub ticker: String,
    /// Sentiment columns present in output; empty when merge degraded.
    pub columns: Vec<SentimentColumn>,
    pub rows: Vec<MergedRow>,
}

impl MergedSeries {
    /// Wrap a clean series with only the ticker column added.
    pub fn clean_only(ticker: &str, clean: &CleanSeries) -> Self {
        Self {
            ticker: ticker.to_string(),
            columns: Vec::new(),
            rows: clean
                .rows
                .iter()
                .map(|row| MergedRow { clean: row.clone(), sentiment: None })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows that received sentiment.
    pub fn matched_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.sentiment.is_some()).count()
    }

    pub fn records(&self) -> Vec<OhlcvRecord> {
        self.rows.iter().map(|r| r.clean.bar).collect()
    }
}

/// Which series the indicator engine consumes for a ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Merged(MergedSeries),
    Clean(CleanSeries),
    Missing,
}

impl InputSource {
    /// Prefer the merged series when allowed, else the clean series.
    pub fn resolve(
        merged: Option<MergedSeries>,
        clean: Option<CleanSeries>,
        use_merged: bool,
    ) -> Self {
        match (merged, clean) {
            (Some(m), _) if use_merged => InputSource::Merged(m),
            (_, Some(c)) => InputSource::Clean(c),
            // Merged rows embed the clean rows, so fall back to them.
            (Some(m), None) => InputSource::Clean(CleanSeries::new(
                m.rows.into_iter().map(|r| r.clean).collect(),
            )),
            (None, None) => InputSource::Missing,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputSource::Merged(_) => "merged",
            InputSource::Clean(_) => "clean",
            InputSource::Missing => "missing",
        }
    }

    /// Bars in date order; empty when missing.
    pub fn records(&self) -> Vec<OhlcvRecord> {
        match self {
            InputSource::Merged(m) => m.records(),
            InputSource::Clean(c) => c.records(),
            InputSource::Missing => Vec::new(),
        }
    }
}

/// Candle direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleType {
    Bullish,
    Bearish,
}

impl CandleType {
    /// Bullish when the adjusted close is above the open.
    #[inline]
    pub fn of(bar: &OhlcvRecord) -> Self {
        if bar.adj_close > bar.open {
            CandleType::Bullish
        } else {
            CandleType::Bearish
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CandleType::Bullish => "bullish",
            CandleType::Bearish => "bearish",
        }
    }
}

/// Pipeline stage a failure record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clean,
    Merge,
    Features,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Clean => "clean",
            Stage::Merge => "merge",
            Stage::Features => "features",
        };
        f.write_str(s)
    }
}

/// One entry of the per-run failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub ticker: String,
    pub stage: Stage,
    /// Machine-readable reason code.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FailureRecord {
    pub fn new(ticker: impl Into<String>, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            reason: reason.into(),
            detail: None,
        }
    }

    /// Record built from an error, with its message as detail.
    pub fn from_error(ticker: impl Into<String>, stage: Stage, err: &Error) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            reason: err.reason_code().to_string(),
            detail: Some(err.to_string()),
        }
    }
}
