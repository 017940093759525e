//! Data ingestion and normalization for the feature pipeline.
//!
//! This crate handles:
//! - CSV table reading and atomic publishing
//! - Raw price series validation and cleaning
//! - Sentiment fusion onto clean series

pub mod cleaner;
pub mod merger;
pub mod table;

pub use cleaner::{Cleaner, CleaningStats};
pub use merger::{DateColumn, DegradeReason, MergeOutcome, MergeResult, Merger};
