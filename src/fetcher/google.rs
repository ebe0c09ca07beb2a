//! Google Trends fetcher (via SerpApi)
//!
//! ## API Reference
//!
//! Endpoint: `https://serpapi.com/search.json?engine=google_trends&q={keyword}&date=today 1-m`
//! Returns: `interest_over_time.timeline_data[]`, one entry per day with a
//! unix `timestamp`, a display `date` and `values[].extracted_value`.

use super::{
    parse_day, replay_fetch, settle_fetch, CredentialStore, FetchBackend, FetchError, FetchHealth,
    FetcherState, RequestSpec, Transport, TrendFetcher,
};
use crate::pipeline::types::DataPoint;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

pub const SOURCE_ID: &str = "google_trends";
pub const API_KEY_CREDENTIAL: &str = "serpapi_key";

const ENDPOINT: &str = "https://serpapi.com/search.json";
/// Timezone offset in minutes, as SerpApi expects it
const TIMEZONE: &str = "-480";
/// Most recent month, daily resolution
const DATE_RANGE: &str = "today 1-m";

/// Backing data for replay mode
pub const REPLAY_VALUES: [f64; 24] = [
    40.0, 47.0, 51.0, 56.0, 61.0, 62.0, 67.0, 62.0, 57.0, 55.0, 53.0, 52.0, 50.0, 48.0, 46.0,
    44.0, 42.0, 40.0, 38.0, 56.0, 60.0, 77.0, 79.0, 80.0,
];
pub const REPLAY_INDEX: usize = 7;

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    search_metadata: Option<SearchMetadata>,
    interest_over_time: Option<InterestOverTime>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchMetadata {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelineItem>,
}

#[derive(Debug, Deserialize)]
struct TimelineItem {
    date: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    extracted_value: Option<f64>,
}

pub struct GoogleTrendsFetcher {
    source: String,
    keyword: String,
    backend: FetchBackend,
    state: Mutex<FetcherState>,
}

impl GoogleTrendsFetcher {
    pub fn new(keyword: &str, backend: FetchBackend) -> Self {
        Self {
            source: SOURCE_ID.to_string(),
            keyword: keyword.to_string(),
            backend,
            state: Mutex::new(FetcherState::default()),
        }
    }

    async fn fetch_live(
        &self,
        transport: &dyn Transport,
        credentials: &dyn CredentialStore,
    ) -> Result<Vec<DataPoint>, FetchError> {
        let api_key = credentials
            .load_credential(API_KEY_CREDENTIAL)
            .ok_or_else(|| FetchError::Credential(API_KEY_CREDENTIAL.to_string()))?;

        let url = reqwest::Url::parse_with_params(
            ENDPOINT,
            &[
                ("engine", "google_trends"),
                ("q", self.keyword.as_str()),
                ("tz", TIMEZONE),
                ("date", DATE_RANGE),
                ("api_key", api_key.as_str()),
            ],
        )
        .map_err(|e| FetchError::Transport(format!("invalid url: {}", e)))?;

        log::debug!("📡 Requesting Google Trends for '{}'", self.keyword);
        let body = transport.issue(&RequestSpec::get(url.as_str())).await?;
        parse_response(&body, &self.source)
    }
}

#[async_trait]
impl TrendFetcher for GoogleTrendsFetcher {
    fn source_id(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Vec<DataPoint> {
        match &self.backend {
            FetchBackend::Replay(feed) => replay_fetch(&self.source, &self.state, feed).await,
            FetchBackend::Live {
                transport,
                credentials,
            } => {
                let result = self.fetch_live(transport.as_ref(), credentials.as_ref()).await;
                settle_fetch(&self.source, &self.state, result).await
            }
        }
    }

    async fn health(&self) -> FetchHealth {
        self.state.lock().await.health.clone()
    }
}

/// Parse a SerpApi Google Trends response body
///
/// Items without a value or a usable date are skipped.
pub fn parse_response(body: &[u8], source: &str) -> Result<Vec<DataPoint>, FetchError> {
    let response: SerpApiResponse = serde_json::from_slice(body)?;

    if let Some(error) = response.error {
        return Err(FetchError::Transport(format!("SerpApi error: {}", error)));
    }
    if let Some(status) = response.search_metadata.and_then(|m| m.status) {
        if status != "Success" {
            return Err(FetchError::Transport(format!("SerpApi status: {}", status)));
        }
    }

    let timeline = response
        .interest_over_time
        .ok_or_else(|| FetchError::Decode("missing interest_over_time".to_string()))?
        .timeline_data;

    let points: Vec<DataPoint> = timeline
        .into_iter()
        .filter_map(|item| {
            let value = item.values.first().and_then(|v| v.extracted_value)?;
            let timestamp = item_timestamp(&item)?;
            Some(DataPoint::new(timestamp, value, source))
        })
        .collect();

    log::debug!("✅ Parsed {} Google Trends points", points.len());
    Ok(points)
}

fn item_timestamp(item: &TimelineItem) -> Option<DateTime<Utc>> {
    if let Some(secs) = item.timestamp.as_deref().and_then(|t| t.parse::<i64>().ok()) {
        return Utc.timestamp_opt(secs, 0).single();
    }
    let date = item.date.as_deref()?;
    match parse_day(date, "%b %d, %Y") {
        Ok(ts) => Some(ts),
        Err(e) => {
            log::debug!("Skipping timeline item: {}", e);
            None
        }
    }
}
