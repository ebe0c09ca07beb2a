//! # TrendFlow
//!
//! Polls search-interest time series from several providers, merges the
//! incremental results per source and evaluates threshold strategies over
//! the merged series.
//!
//! ```text
//! PollingScheduler ──tick──► FetchOrchestrator ──fan-out──► TrendFetcher (× N)
//!                                   │                           │
//!                                   │ fan-in + merge            └─ decoder (Baidu)
//!                                   ▼
//!                              SeriesStore ──► StrategyEngine ──► SignalSink
//! ```

pub mod config;
pub mod fetcher;
pub mod pipeline;
pub mod strategy;

pub use config::{ConfigError, FetchMode, RuntimeConfig};
pub use fetcher::{FetchError, TrendFetcher};
pub use pipeline::{DataPoint, FetchOrchestrator, SeriesStore, SignalEvent};
pub use strategy::StrategyEngine;
