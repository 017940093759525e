//! Per-ticker outcomes and the batch summary.

use serde::Serialize;
use tracing::info;

use ohlcv_core::FailureRecord;

/// How one ticker's pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerStatus {
    /// Feature table published.
    Succeeded,
    /// Nothing to process (no raw data, no input series).
    Skipped,
    /// A stage failed; outputs for the ticker were withdrawn.
    Failed,
    /// Not started because the run was cancelled.
    Cancelled,
}

/// Result of running one ticker through Clean -> Merge -> Features.
#[derive(Debug, Clone, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub status: TickerStatus,
    /// Failure-log entries raised for this ticker, in stage order.
    pub records: Vec<FailureRecord>,
    /// Rows kept by the cleaner.
    pub clean_rows: usize,
    /// Rows in the published feature table.
    pub feature_rows: usize,
    /// Which series fed the indicators ("merged", "clean", "missing").
    pub source: Option<&'static str>,
}

impl TickerReport {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            status: TickerStatus::Succeeded,
            records: Vec::new(),
            clean_rows: 0,
            feature_rows: 0,
            source: None,
        }
    }

    pub fn cancelled(ticker: impl Into<String>) -> Self {
        Self {
            status: TickerStatus::Cancelled,
            ..Self::new(ticker)
        }
    }

    /// Attach a failure-log entry.
    pub fn record(&mut self, record: FailureRecord) {
        self.records.push(record);
    }

    /// End the report with `status` and one final record.
    pub fn finish(mut self, status: TickerStatus, record: FailureRecord) -> Self {
        self.status = status;
        self.records.push(record);
        self
    }
}

/// Counts and failure list for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Every failure-log entry, in ticker order.
    pub failures: Vec<FailureRecord>,
}

impl BatchSummary {
    /// Aggregate reports, keeping their order.
    pub fn from_reports(reports: Vec<TickerReport>) -> Self {
        let mut summary = BatchSummary {
            total: reports.len(),
            ..Default::default()
        };

        for report in reports {
            match report.status {
                TickerStatus::Succeeded => summary.succeeded += 1,
                TickerStatus::Skipped => summary.skipped += 1,
                TickerStatus::Failed => summary.failed += 1,
                TickerStatus::Cancelled => summary.cancelled += 1,
            }
            summary.failures.extend(report.records);
        }

        summary
    }

    /// Emit the summary line plus one line per failure-log entry.
    pub fn log(&self) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            skipped = self.skipped,
            failed = self.failed,
            cancelled = self.cancelled,
            "batch complete"
        );
        for record in &self.failures {
            info!(
                ticker = %record.ticker,
                stage = %record.stage,
                reason = %record.reason,
                "failure log entry"
            );
        }
    }
}
