//! Technical indicator computation for the feature pipeline.
//!
//! This crate handles:
//! - Volume and price-structure features
//! - Moving averages and their alignment
//! - Rolling volatility (ATR proxy, Bollinger width, range spikes)
//! - Momentum (RSI, MACD, stochastic %K)

pub mod engine;
pub mod momentum;
pub mod volatility;

pub use engine::{FeatureEngine, FeatureRow, FeatureTable, IndicatorRow};
pub use momentum::Ema;
