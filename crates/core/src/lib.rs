//! Core types and configuration for the OHLCV feature pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Price, clean, merged and sentiment series types
//! - Configuration structures
//! - Common error types
//! - Trailing-window math shared by cleaning and indicator computation

pub mod config;
pub mod error;
pub mod rolling;
pub mod types;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use types::*;
