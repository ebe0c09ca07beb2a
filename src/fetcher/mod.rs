//! Source fetchers
//!
//! Every provider implements [`TrendFetcher`]. A fetch returns only the
//! points that are new since the previous successful fetch; failures of any
//! kind are absorbed here and surface as an empty result.
//!
//! ## Module Organization
//!
//! - `decoder` - substitution-cipher decoding of encoded payloads
//! - `replay` - deterministic replay feed used instead of the network
//! - `transport` - HTTP transport and credential collaborators
//! - `google` - Google Trends (SerpApi) fetcher
//! - `baidu` - Baidu index fetcher (encoded payload + decode key)

pub mod baidu;
pub mod decoder;
pub mod google;
pub mod replay;
pub mod transport;

pub use baidu::BaiduIndexFetcher;
pub use google::GoogleTrendsFetcher;
pub use replay::ReplayFeed;
pub use transport::{CredentialStore, HttpTransport, RequestSpec, Transport};

use crate::pipeline::types::DataPoint;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Capability contract shared by all providers
#[async_trait]
pub trait TrendFetcher: Send + Sync {
    /// Source label of this fetcher (sub-series may extend it)
    fn source_id(&self) -> &str;

    /// Fetch points newer than the cursor. Never fails: errors yield `vec![]`.
    async fn fetch(&self) -> Vec<DataPoint>;

    /// Success/failure counters for observability
    async fn health(&self) -> FetchHealth {
        FetchHealth::default()
    }
}

/// Where a fetcher gets its raw data from
///
/// Injected at construction; live and replay fetchers share the same
/// cursor and failure handling.
pub enum FetchBackend {
    Live {
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    },
    Replay(Mutex<ReplayFeed>),
}

impl FetchBackend {
    pub fn live(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        FetchBackend::Live {
            transport,
            credentials,
        }
    }

    pub fn replay(feed: ReplayFeed) -> Self {
        FetchBackend::Replay(Mutex::new(feed))
    }
}

/// Fetch failure taxonomy (absorbed at the fetcher boundary)
#[derive(Debug)]
pub enum FetchError {
    /// Network failure, HTTP status or provider-reported error status
    Transport(String),
    /// Required credential is absent
    Credential(String),
    /// Malformed payload or missing expected fields
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::Credential(name) => write!(f, "Missing credential: {}", name),
            FetchError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Per-fetcher watermark of the last-seen provider timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchCursor {
    last_fetch_date: Option<DateTime<Utc>>,
}

impl FetchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fetch_date(&self) -> Option<DateTime<Utc>> {
        self.last_fetch_date
    }

    /// Keep points strictly after the cursor, then advance the cursor
    ///
    /// The cursor moves to the maximum timestamp of the *full* raw batch,
    /// so it tracks provider freshness even when filtering yields nothing.
    /// It never moves backwards.
    pub fn take_new(&mut self, raw: Vec<DataPoint>) -> Vec<DataPoint> {
        let raw_max = raw.iter().map(|p| p.timestamp).max();

        let fresh: Vec<DataPoint> = match self.last_fetch_date {
            Some(last) => raw.into_iter().filter(|p| p.timestamp > last).collect(),
            None => raw,
        };

        if let Some(max) = raw_max {
            if self.last_fetch_date.map_or(true, |last| max > last) {
                self.last_fetch_date = Some(max);
            }
        }

        fresh
    }
}

/// Parse a provider calendar date (e.g. `2025-07-04` with `%Y-%m-%d`)
/// into midnight UTC
pub fn parse_day(raw: &str, format: &str) -> Result<DateTime<Utc>, FetchError> {
    let date = NaiveDate::parse_from_str(raw.trim(), format)
        .map_err(|e| FetchError::Decode(format!("bad date '{}': {}", raw, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| FetchError::Decode(format!("bad date '{}'", raw)))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchHealth {
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// Mutable per-fetcher state: cursor plus health counters
#[derive(Debug, Default)]
pub struct FetcherState {
    pub cursor: FetchCursor,
    pub health: FetchHealth,
}

impl FetcherState {
    /// Run a raw fetch result through the cursor and health counters
    ///
    /// On success the raw batch goes through the cursor; on failure the error
    /// is logged and recorded, the cursor is left untouched and nothing is
    /// returned.
    pub fn settle(&mut self, source: &str, result: Result<Vec<DataPoint>, FetchError>) -> Vec<DataPoint> {
        match result {
            Ok(raw) => {
                let raw_len = raw.len();
                let fresh = self.cursor.take_new(raw);
                self.health.successes += 1;
                log::debug!(
                    "✅ {}: {} raw points, {} new (cursor: {:?})",
                    source,
                    raw_len,
                    fresh.len(),
                    self.cursor.last_fetch_date()
                );
                fresh
            }
            Err(e) => {
                log::warn!("⚠️  {} fetch failed: {}", source, e);
                self.health.failures += 1;
                self.health.last_error = Some(e.to_string());
                Vec::new()
            }
        }
    }
}

/// Shared tail of every live `fetch()`
pub(crate) async fn settle_fetch(
    source: &str,
    state: &Mutex<FetcherState>,
    result: Result<Vec<DataPoint>, FetchError>,
) -> Vec<DataPoint> {
    state.lock().await.settle(source, result)
}

/// Replay counterpart of [`settle_fetch`]
///
/// The state lock is taken before the feed advances and there is no await
/// point between advancing and settling, so a cancelled fetch never drops
/// a replay point.
pub(crate) async fn replay_fetch(
    source: &str,
    state: &Mutex<FetcherState>,
    feed: &Mutex<ReplayFeed>,
) -> Vec<DataPoint> {
    let mut state = state.lock().await;
    let raw = feed.lock().await.next_batch();
    state.settle(source, Ok(raw))
}
