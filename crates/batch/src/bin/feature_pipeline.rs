//! `feature-pipeline [config.json]`
//!
//! Cleans, merges and computes features for every configured ticker, then
//! prints the run summary as JSON.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ohlcv_batch::{BatchRunner, CsvPriceDir, CsvSentimentFile};
use ohlcv_core::PipelineConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("loading config {path}"))?,
        None => PipelineConfig::default(),
    };

    let prices = CsvPriceDir::new(&config.paths.raw_dir);
    let tickers = if config.batch.tickers.is_empty() {
        prices
            .discover_tickers()
            .with_context(|| format!("listing {}", config.paths.raw_dir.display()))?
    } else {
        config.batch.tickers.clone()
    };
    let sentiment = CsvSentimentFile::new(config.paths.sentiment_file.clone());

    let runner = BatchRunner::new(&config)?;
    let summary = runner.run(&tickers, &prices, &sentiment)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
