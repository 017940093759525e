//! Boundaries to the upstream collaborators.
//!
//! The market-data fetcher and the news/sentiment scorer run outside this
//! workspace. They hand over plain tables, or an explicit "nothing".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ohlcv_core::{Error, RawTable, Result};
use ohlcv_ingestion::table::read_table;

/// Supplies one raw price table per ticker.
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` means the provider has no data for this ticker.
    fn fetch(&self, ticker: &str) -> Result<Option<RawTable>>;
}

/// Supplies the sentiment table for a run.
pub trait SentimentSource {
    /// `Ok(None)` means sentiment is unavailable for this run.
    fn load(&self) -> Result<Option<RawTable>>;
}

/// Raw price tables stored as `<dir>/<TICKER>.csv`.
#[derive(Debug, Clone)]
pub struct CsvPriceDir {
    dir: PathBuf,
}

impl CsvPriceDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.csv"))
    }

    /// Ticker symbols of every `*.csv` in the directory, sorted.
    pub fn discover_tickers(&self) -> Result<Vec<String>> {
        let mut tickers = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tickers.push(stem.to_string());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

impl PriceSource for CsvPriceDir {
    fn fetch(&self, ticker: &str) -> Result<Option<RawTable>> {
        let path = self.path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        read_table(&path).map(Some)
    }
}

impl PriceSource for HashMap<String, RawTable> {
    fn fetch(&self, ticker: &str) -> Result<Option<RawTable>> {
        Ok(self.get(ticker).cloned())
    }
}

/// A sentiment CSV at an optional path.
///
/// No path means sentiment is switched off. A configured path that does not
/// exist is a [`Error::SourceMissing`].
#[derive(Debug, Clone, Default)]
pub struct CsvSentimentFile {
    path: Option<PathBuf>,
}

impl CsvSentimentFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl SentimentSource for CsvSentimentFile {
    fn load(&self) -> Result<Option<RawTable>> {
        match &self.path {
            Some(p) if p.exists() => read_table(p).map(Some),
            Some(p) => Err(Error::source_missing(format!("sentiment file {}", p.display()))),
            None => Ok(None),
        }
    }
}

/// Sentiment already in memory.
impl SentimentSource for Option<RawTable> {
    fn load(&self) -> Result<Option<RawTable>> {
        Ok(self.clone())
    }
}
