//! Sentiment fusion onto clean price series.
//!
//! Left-joins one ticker's clean series with at most one sentiment row per
//! calendar date. Missing sources, missing tickers and unknown date columns
//! degrade to a clean-only result with a machine-readable reason.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ohlcv_core::config::MergeConfig;
use ohlcv_core::{
    CleanSeries, MergedRow, MergedSeries, RawTable, SentimentColumn, SentimentValues, DATE_FORMAT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Naive datetime layouts accepted for sentiment timestamps.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Result of looking for the sentiment table's date-bearing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateColumn {
    /// First candidate present in the table.
    Matched { name: String, index: usize },
    /// No candidate present.
    None,
}

/// Try `candidates` in order against the table header.
pub fn resolve_date_column(table: &RawTable, candidates: &[String]) -> DateColumn {
    candidates
        .iter()
        .find_map(|name| {
            table.column_index(name).map(|index| DateColumn::Matched {
                name: name.clone(),
                index,
            })
        })
        .unwrap_or(DateColumn::None)
}

/// Why a merge fell back to clean-only output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// No sentiment table, or an empty one.
    NoSource,
    /// Sentiment table has no ticker column.
    NoTickerColumn,
    /// None of the date-column candidates is present.
    NoDateColumn,
    /// Sentiment table has no rows for this ticker.
    TickerAbsent,
}

impl DegradeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DegradeReason::NoSource => "no_source",
            DegradeReason::NoTickerColumn => "no_ticker_column",
            DegradeReason::NoDateColumn => "no_date_column",
            DegradeReason::TickerAbsent => "ticker_absent",
        }
    }
}

/// How a merge went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Sentiment joined.
    Joined {
        /// Date column used.
        date_column: String,
        /// Distinct sentiment dates for the ticker after de-duplication.
        sentiment_dates: usize,
        /// Price rows that received sentiment.
        matched_rows: usize,
    },
    /// Clean-only output.
    Degraded(DegradeReason),
}

/// Merged series plus how it was produced.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub series: MergedSeries,
    pub outcome: MergeOutcome,
}

impl MergeResult {
    /// Degrade reason, if the merge fell back.
    pub fn degraded(&self) -> Option<DegradeReason> {
        match self.outcome {
            MergeOutcome::Degraded(reason) => Some(reason),
            MergeOutcome::Joined { .. } => None,
        }
    }
}

/// Allow-listed columns located in a sentiment table.
#[derive(Debug, Clone, Copy, Default)]
struct ValueColumns {
    score: Option<usize>,
    keyword_count: Option<usize>,
    headline: Option<usize>,
    url: Option<usize>,
}

impl ValueColumns {
    fn present(&self) -> Vec<SentimentColumn> {
        SentimentColumn::ALL
            .into_iter()
            .filter(|c| self.index(*c).is_some())
            .collect()
    }

    fn index(&self, column: SentimentColumn) -> Option<usize> {
        match column {
            SentimentColumn::Score => self.score,
            SentimentColumn::KeywordCount => self.keyword_count,
            SentimentColumn::Headline => self.headline,
            SentimentColumn::Url => self.url,
        }
    }

    fn read(&self, table: &RawTable, row: usize) -> SentimentValues {
        let text = |col: Option<usize>| {
            col.and_then(|c| table.cell(row, c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        SentimentValues {
            score: text(self.score).and_then(parse_score),
            keyword_count: text(self.keyword_count).and_then(parse_count),
            headline: text(self.headline).map(String::from),
            url: text(self.url).map(String::from),
        }
    }
}

/// Joins sentiment tables onto clean series.
#[derive(Debug, Clone)]
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    /// Create a new merger from configuration.
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Merge `clean` with the rows of `sentiment` belonging to `ticker`.
    ///
    /// Never fails: every problem with the sentiment side degrades to the clean
    /// series plus a ticker column. The result always has `clean.len()` rows.
    pub fn merge(&self, clean: &CleanSeries, ticker: &str, sentiment: Option<&RawTable>) -> MergeResult {
        let result = match self.try_join(clean, ticker, sentiment) {
            Ok(result) => result,
            Err(reason) => {
                info!(ticker, reason = reason.as_str(), "sentiment merge degraded to clean-only");
                MergeResult {
                    series: MergedSeries::clean_only(ticker, clean),
                    outcome: MergeOutcome::Degraded(reason),
                }
            }
        };
        debug_assert_eq!(result.series.len(), clean.len());
        result
    }

    fn try_join(
        &self,
        clean: &CleanSeries,
        ticker: &str,
        sentiment: Option<&RawTable>,
    ) -> std::result::Result<MergeResult, DegradeReason> {
        let table = match sentiment {
            Some(t) if !t.is_empty() => t,
            _ => return Err(DegradeReason::NoSource),
        };
        let ticker_col = table
            .column_index(&self.config.ticker_column)
            .ok_or(DegradeReason::NoTickerColumn)?;
        let (date_column, date_col) = match resolve_date_column(table, &self.config.date_column_candidates) {
            DateColumn::Matched { name, index } => (name, index),
            DateColumn::None => return Err(DegradeReason::NoDateColumn),
        };

        let ticker_rows: Vec<usize> = (0..table.len())
            .filter(|&i| table.cell(i, ticker_col).map(str::trim) == Some(ticker))
            .collect();
        if ticker_rows.is_empty() {
            return Err(DegradeReason::TickerAbsent);
        }

        let values = self.value_columns(table);
        let mut by_date: HashMap<NaiveDate, SentimentValues> = HashMap::new();
        let mut unparseable = 0usize;
        for &i in &ticker_rows {
            let Some(date) = table.cell(i, date_col).and_then(normalize_timestamp) else {
                unparseable += 1;
                continue;
            };
            // First row seen for a date wins.
            by_date.entry(date).or_insert_with(|| values.read(table, i));
        }

        let rows: Vec<MergedRow> = clean
            .rows
            .iter()
            .map(|row| MergedRow {
                clean: row.clone(),
                sentiment: by_date.get(&row.bar.date).cloned(),
            })
            .collect();
        let series = MergedSeries {
            ticker: ticker.to_string(),
            columns: values.present(),
            rows,
        };
        let matched_rows = series.matched_rows();

        debug!(
            ticker,
            ticker_rows = ticker_rows.len(),
            unparseable,
            "sentiment rows collected"
        );
        info!(ticker, date_column = %date_column, matched_rows, "sentiment merged");

        Ok(MergeResult {
            series,
            outcome: MergeOutcome::Joined {
                date_column,
                sentiment_dates: by_date.len(),
                matched_rows,
            },
        })
    }

    fn value_columns(&self, table: &RawTable) -> ValueColumns {
        ValueColumns {
            score: table.column_index(&self.config.score_column),
            keyword_count: table.column_index(&self.config.keyword_count_column),
            headline: table.column_index(&self.config.headline_column),
            url: table.column_index(&self.config.url_column),
        }
    }
}

/// Truncate a sentiment timestamp to its calendar date.
///
/// Accepts plain dates, naive datetimes, RFC 3339 timestamps (date taken at the
/// timestamp's own offset), compact `YYYYMMDD` and Unix epoch seconds or
/// milliseconds (UTC, integral float text allowed).
pub fn normalize_timestamp(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return Some(date);
        }
    }
    if let Some(epoch) = parse_epoch(s) {
        let dt = if epoch >= EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(epoch)?
        } else {
            DateTime::from_timestamp(epoch, 0)?
        };
        return Some(dt.date_naive());
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local().date());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Epoch as digits, or digits with an all-zero fraction (`1709553600.0`).
fn parse_epoch(s: &str) -> Option<i64> {
    let (int, frac) = s.split_once('.').unwrap_or((s, "0"));
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || !digits(frac) || frac.bytes().any(|b| b != b'0') {
        return None;
    }
    int.parse().ok()
}

fn parse_score(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Counts may arrive as float text when the producer had missing values.
fn parse_count(s: &str) -> Option<u64> {
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0).then_some(v as u64)
}
