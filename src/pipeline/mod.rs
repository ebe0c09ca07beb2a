//! # Ingestion pipeline
//!
//! Fetch cycles fan out to every registered fetcher, fan back in, and merge
//! the new points into a single in-memory [`SeriesStore`]. Strategy
//! evaluation runs only on cycles that merged something, under the same
//! write guard as the merge.
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (DataPoint, SignalEvent, SeriesUpdate)
//! - `store` - Per-source append-only series store
//! - `orchestrator` - Concurrent fetch cycle + merge
//! - `sink` - Signal sinks (channel, log, message inbox)
//! - `scheduler` - Periodic, cancellable polling loop

pub mod orchestrator;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod types;

pub use orchestrator::{FetchOrchestrator, SourceHealth};
pub use scheduler::{run_polling, SignalPipeline, TickReport};
pub use sink::{ChannelSink, FanoutSink, LogSink, MessageInbox, MessageKind, SignalSink};
pub use store::{SeriesStore, SharedSeriesStore};
pub use types::{DataPoint, SeriesUpdate, SignalDirection, SignalEvent, SignalStrength, SourceId};
