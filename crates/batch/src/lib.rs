//! Batch orchestration for the feature pipeline.
//!
//! This crate provides:
//! - Collaborator seams for raw prices and sentiment
//! - Per-ticker Clean -> Merge -> Features runs with failure isolation
//! - Atomic publishing of clean, merged and feature tables
//! - The per-run failure log and summary

pub mod output;
pub mod report;
pub mod runner;
pub mod sources;

pub use output::ArtifactPaths;
pub use report::{BatchSummary, TickerReport, TickerStatus};
pub use runner::{BatchRunner, CancelFlag};
pub use sources::{CsvPriceDir, CsvSentimentFile, PriceSource, SentimentSource};
