//! Configuration structures for the feature pipeline.
//!
//! Every component receives the section it needs at construction time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Cleaner configuration.
    pub cleaning: CleaningConfig,
    /// Sentiment merge configuration.
    pub merge: MergeConfig,
    /// Indicator windows.
    pub features: FeatureConfig,
    /// Batch execution configuration.
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.cleaning.rsi_period == 0 {
            return Err(Error::config("cleaning.rsi_period must be positive"));
        }
        if self.merge.date_column_candidates.is_empty() {
            return Err(Error::config("merge.date_column_candidates must not be empty"));
        }
        self.features.validate()
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of raw price tables, one `<TICKER>.csv` per ticker.
    pub raw_dir: PathBuf,
    /// Directory for clean tables.
    pub clean_dir: PathBuf,
    /// Directory for merged tables.
    pub merged_dir: PathBuf,
    /// Directory for feature tables.
    pub feature_dir: PathBuf,
    /// Sentiment table (absent = run without sentiment).
    pub sentiment_file: Option<PathBuf>,
    /// Failure log written once per run.
    pub failure_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            clean_dir: PathBuf::from("data/clean"),
            merged_dir: PathBuf::from("data/merged"),
            feature_dir: PathBuf::from("data/features"),
            sentiment_file: Some(PathBuf::from("data/news/news_sentiment_features.csv")),
            failure_log: PathBuf::from("logs/failed_tickers.json"),
        }
    }
}

/// Cleaner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// RSI window used for the clean-series `RSI_14` field.
    pub rsi_period: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self { rsi_period: 14 }
    }
}

/// Sentiment merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Name of the ticker column in the sentiment table.
    pub ticker_column: String,
    /// Date-bearing column names, tried in order.
    pub date_column_candidates: Vec<String>,
    /// Sentiment score column.
    pub score_column: String,
    /// Positive keyword count column.
    pub keyword_count_column: String,
    /// Headline text column.
    pub headline_column: String,
    /// Source URL column.
    pub url_column: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ticker_column: "Ticker".to_string(),
            date_column_candidates: ["providerPublishTime", "publishedAt", "datetime", "date", "Date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            score_column: "news_sentiment_score".to_string(),
            keyword_count_column: "positive_keywords_count".to_string(),
            headline_column: "title".to_string(),
            url_column: "url".to_string(),
        }
    }
}

/// Indicator window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Use the merged series when one exists.
    pub use_sentiment: bool,
    /// Volume ratio window (about three months of sessions).
    pub volume_window: usize,
    /// Short moving average window.
    pub ma_short: usize,
    /// Medium moving average window.
    pub ma_medium: usize,
    /// Long moving average window.
    pub ma_long: usize,
    /// ATR proxy window.
    pub atr_window: usize,
    /// Bollinger width window.
    pub bollinger_window: usize,
    /// Intraday range window for the volatility spike flag.
    pub spike_window: usize,
    /// Spike threshold as a multiple of the mean range.
    pub spike_factor: f64,
    /// RSI window.
    pub rsi_window: usize,
    /// MACD fast EMA span.
    pub macd_fast: usize,
    /// MACD slow EMA span.
    pub macd_slow: usize,
    /// MACD signal EMA span.
    pub macd_signal: usize,
    /// Stochastic %K window.
    pub stochastic_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            use_sentiment: true,
            volume_window: 63,
            ma_short: 5,
            ma_medium: 20,
            ma_long: 60,
            atr_window: 14,
            bollinger_window: 20,
            spike_window: 14,
            spike_factor: 1.5,
            rsi_window: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stochastic_window: 14,
        }
    }
}

impl FeatureConfig {
    /// Longest trailing window; shorter series leave some indicator all-null.
    pub fn longest_window(&self) -> usize {
        [
            self.volume_window,
            self.ma_short,
            self.ma_medium,
            self.ma_long,
            self.atr_window,
            self.bollinger_window,
            self.spike_window,
            self.rsi_window + 1,
            self.stochastic_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        let windows = [
            ("volume_window", self.volume_window),
            ("ma_short", self.ma_short),
            ("ma_medium", self.ma_medium),
            ("ma_long", self.ma_long),
            ("atr_window", self.atr_window),
            ("bollinger_window", self.bollinger_window),
            ("spike_window", self.spike_window),
            ("rsi_window", self.rsi_window),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("stochastic_window", self.stochastic_window),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(Error::config(format!("features.{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Batch execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Tickers to process. Empty = every `*.csv` stem in the raw directory.
    pub tickers: Vec<String>,
    /// Number of worker threads (0 = auto).
    pub workers: usize,
    /// Process tickers one at a time on the calling thread.
    pub force_sequential: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.cleaning.rsi_period, 14);
        assert_eq!(config.features.volume_window, 63);
        assert_eq!(config.merge.date_column_candidates[0], "providerPublishTime");
        assert_eq!(config.features.longest_window(), 63);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "batch": { "tickers": ["AAPL"], "workers": 2 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch.tickers, vec!["AAPL".to_string()]);
        assert_eq!(config.batch.workers, 2);
        assert_eq!(config.features.ma_long, 60);
        assert_eq!(config.merge.ticker_column, "Ticker");
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = PipelineConfig::default();
        config.features.atr_window = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
