//! Batch runner.
//!
//! Drives every ticker through Clean -> Merge -> Features, isolating failures
//! per ticker and writing the failure log once at the end of the run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{info, warn};

use ohlcv_core::{
    CleanSeries, Error, FailureRecord, InputSource, MergedSeries, PipelineConfig, RawTable, Result, Stage,
};
use ohlcv_features::FeatureEngine;
use ohlcv_ingestion::table::{publish_json, remove_stale};
use ohlcv_ingestion::{Cleaner, Merger};

use crate::output::{write_clean, write_features, write_merged, ArtifactPaths};
use crate::report::{BatchSummary, TickerReport, TickerStatus};
use crate::sources::{PriceSource, SentimentSource};

/// Shared stop switch, checked before each ticker starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop starting new tickers. Tickers already running finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the per-ticker pipeline over a ticker list.
pub struct BatchRunner {
    cleaner: Cleaner,
    merger: Merger,
    engine: FeatureEngine,
    artifacts: ArtifactPaths,
    failure_log: PathBuf,
    use_sentiment: bool,
    force_sequential: bool,
    pool: Option<ThreadPool>,
    cancel: CancelFlag,
}

impl BatchRunner {
    /// Create a runner from a validated configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let pool = if config.batch.workers > 0 && !config.batch.force_sequential {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.batch.workers)
                .build()
                .map_err(|e| Error::config(format!("worker pool: {e}")))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            cleaner: Cleaner::new(&config.cleaning),
            merger: Merger::new(&config.merge),
            engine: FeatureEngine::new(&config.features),
            artifacts: ArtifactPaths::new(&config.paths),
            failure_log: config.paths.failure_log.clone(),
            use_sentiment: config.features.use_sentiment,
            force_sequential: config.batch.force_sequential,
            pool,
            cancel: CancelFlag::new(),
        })
    }

    /// Handle for stopping the run from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Process `tickers` and publish the failure log.
    ///
    /// Per-ticker problems never abort the run; only failing to write the
    /// failure log itself is an error.
    pub fn run(
        &self,
        tickers: &[String],
        prices: &dyn PriceSource,
        sentiment: &dyn SentimentSource,
    ) -> Result<BatchSummary> {
        let sentiment = match sentiment.load() {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "sentiment source failed, merging clean-only");
                None
            }
        };
        let sentiment = sentiment.as_ref();

        info!(tickers = tickers.len(), sentiment = sentiment.is_some(), "batch started");

        let reports: Vec<TickerReport> = if self.force_sequential {
            tickers
                .iter()
                .map(|t| self.process_ticker(t, prices, sentiment))
                .collect()
        } else {
            let work = || {
                tickers
                    .par_iter()
                    .map(|t| self.process_ticker(t, prices, sentiment))
                    .collect::<Vec<_>>()
            };
            match &self.pool {
                Some(pool) => pool.install(work),
                None => work(),
            }
        };

        let summary = BatchSummary::from_reports(reports);
        publish_json(&self.failure_log, &summary.failures)?;
        summary.log();
        Ok(summary)
    }

    /// Run one ticker through every stage.
    pub fn process_ticker(
        &self,
        ticker: &str,
        prices: &dyn PriceSource,
        sentiment: Option<&RawTable>,
    ) -> TickerReport {
        if self.cancel.is_cancelled() {
            return TickerReport::cancelled(ticker);
        }
        let mut report = TickerReport::new(ticker);

        let raw = match prices.fetch(ticker) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!(ticker, "no raw data, skipping");
                return report.finish(
                    TickerStatus::Skipped,
                    FailureRecord::new(ticker, Stage::Clean, "no_raw_data"),
                );
            }
            Err(e) => return self.fail(report, Stage::Clean, e),
        };

        let clean = match self.clean(ticker, &raw) {
            Ok(clean) => clean,
            Err(e) => return self.fail(report, Stage::Clean, e),
        };
        report.clean_rows = clean.len();

        let merged = self.merge(&mut report, &clean, sentiment);

        let source = InputSource::resolve(merged, Some(clean), self.use_sentiment);
        let Some(table) = self.engine.compute(source) else {
            return report.finish(
                TickerStatus::Skipped,
                FailureRecord::new(ticker, Stage::Features, "no_input"),
            );
        };

        if !self.engine.is_ready(table.len()) {
            let err = Error::insufficient_history(format!(
                "{} rows, longest window {}",
                table.len(),
                self.engine.longest_window()
            ));
            info!(ticker, rows = table.len(), "history shorter than longest window");
            report.record(FailureRecord::from_error(ticker, Stage::Features, &err));
        }

        if let Err(e) = write_features(&self.artifacts.features(ticker), &table) {
            return self.fail(report, Stage::Features, e);
        }

        report.feature_rows = table.len();
        report.source = Some(table.source_kind());
        info!(
            ticker,
            rows = table.len(),
            source = table.source_kind(),
            "features published"
        );
        report
    }

    fn clean(&self, ticker: &str, raw: &RawTable) -> Result<CleanSeries> {
        let (clean, stats) = self.cleaner.clean_with_stats(raw)?;
        clean.validate()?;
        write_clean(&self.artifacts.clean(ticker), &clean)?;
        info!(
            ticker,
            input = stats.input_rows,
            kept = stats.output_rows,
            "clean series published"
        );
        Ok(clean)
    }

    /// Merge and publish. `None` means the merged table could not be written
    /// and features fall back to the clean series.
    fn merge(
        &self,
        report: &mut TickerReport,
        clean: &CleanSeries,
        sentiment: Option<&RawTable>,
    ) -> Option<MergedSeries> {
        let ticker = report.ticker.clone();
        let result = self.merger.merge(clean, &ticker, sentiment);
        if let Some(reason) = result.degraded() {
            report.record(FailureRecord::new(&ticker, Stage::Merge, reason.as_str()));
        }

        let path = self.artifacts.merged(&ticker);
        match write_merged(&path, &result.series) {
            Ok(()) => Some(result.series),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "merged table not published");
                report.record(FailureRecord::from_error(&ticker, Stage::Merge, &e));
                if let Err(e) = remove_stale(&path) {
                    warn!(ticker = %ticker, error = %e, "stale merged table left in place");
                }
                None
            }
        }
    }

    /// Record a ticker-level failure and withdraw its published outputs.
    fn fail(&self, report: TickerReport, stage: Stage, err: Error) -> TickerReport {
        let ticker = report.ticker.clone();
        warn!(ticker = %ticker, %stage, error = %err, "ticker failed");
        match self.artifacts.remove_all(&ticker) {
            Ok(0) => {}
            Ok(removed) => info!(ticker = %ticker, removed, "removed stale outputs"),
            Err(e) => warn!(ticker = %ticker, error = %e, "could not remove stale outputs"),
        }
        report.finish(
            TickerStatus::Failed,
            FailureRecord::from_error(ticker, stage, &err),
        )
    }
}
