//! Baidu index fetcher
//!
//! The index API returns its series obfuscated with a per-request
//! substitution key. A fetch takes three steps:
//!
//! 1. `GET /api/SearchApi/index` with the session cookie → encoded series + `uniqid`
//! 2. `GET /Interface/ptbk?uniqid=…` → decode key
//! 3. decode every series kind (`all`, `pc`, `wise`) of every keyword
//!
//! Each decoded series becomes its own source: `baidu_index-{keyword}-{kind}`.

use super::decoder::{decode, parse_decoded_series};
use super::transport::{CredentialStore, RequestSpec, Transport, DEFAULT_USER_AGENT};
use super::{
    parse_day, replay_fetch, settle_fetch, FetchBackend, FetchError, FetchHealth, FetcherState,
    TrendFetcher,
};
use crate::pipeline::types::DataPoint;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

pub const SOURCE_ID: &str = "baidu_index";
pub const COOKIE_CREDENTIAL: &str = "baidu_cookie";
pub const CIPHER_TEXT_CREDENTIAL: &str = "baidu_cipher_text";

const INDEX_ENDPOINT: &str = "https://index.baidu.com/api/SearchApi/index";
const PTBK_ENDPOINT: &str = "https://index.baidu.com/Interface/ptbk";
const REFERER: &str = "https://index.baidu.com/v2/main/index.html";
const WINDOW_DAYS: &str = "30";

/// Backing data for replay mode
pub const REPLAY_VALUES: [f64; 26] = [
    55.0, 57.0, 61.0, 65.0, 64.0, 62.0, 60.0, 58.0, 56.0, 54.0, 52.0, 50.0, 48.0, 46.0, 44.0,
    42.0, 40.0, 38.0, 36.0, 34.0, 32.0, 30.0, 28.0, 26.0, 24.0, 22.0,
];
pub const REPLAY_INDEX: usize = 7;

#[derive(Debug, Deserialize)]
struct IndexResponse {
    data: IndexData,
}

#[derive(Debug, Deserialize)]
struct IndexData {
    uniqid: Option<String>,
    #[serde(rename = "userIndexes", default)]
    user_indexes: Vec<UserIndex>,
}

#[derive(Debug, Deserialize)]
struct UserIndex {
    #[serde(default)]
    word: Vec<WordEntry>,
    all: Option<EncodedSeries>,
    pc: Option<EncodedSeries>,
    wise: Option<EncodedSeries>,
}

#[derive(Debug, Deserialize)]
struct WordEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EncodedSeries {
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(rename = "endDate")]
    end_date: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct PtbkResponse {
    data: Option<String>,
}

pub struct BaiduIndexFetcher {
    source: String,
    keyword: String,
    backend: FetchBackend,
    state: Mutex<FetcherState>,
}

impl BaiduIndexFetcher {
    pub fn new(keyword: &str, backend: FetchBackend) -> Self {
        Self {
            source: SOURCE_ID.to_string(),
            keyword: keyword.to_string(),
            backend,
            state: Mutex::new(FetcherState::default()),
        }
    }

    /// Replay points are labelled as the `all` series of the configured keyword
    pub fn replay_source(keyword: &str) -> String {
        series_source(keyword, "all")
    }

    async fn crawl(
        &self,
        transport: &dyn Transport,
        credentials: &dyn CredentialStore,
    ) -> Result<Vec<DataPoint>, FetchError> {
        let cookie = credentials
            .load_credential(COOKIE_CREDENTIAL)
            .ok_or_else(|| FetchError::Credential(COOKIE_CREDENTIAL.to_string()))?;
        let cipher_text = credentials.load_credential(CIPHER_TEXT_CREDENTIAL);

        let words = serde_json::json!([[{ "name": self.keyword, "wordType": 1 }]]).to_string();
        let url = reqwest::Url::parse_with_params(
            INDEX_ENDPOINT,
            &[("area", "0"), ("word", words.as_str()), ("days", WINDOW_DAYS)],
        )
        .map_err(|e| FetchError::Transport(format!("invalid url: {}", e)))?;

        log::debug!("📡 Requesting Baidu index for '{}'", self.keyword);
        let request = self.request(url.as_str(), &cookie, cipher_text.as_deref());
        let body = transport.issue(&request).await?;
        let (uniqid, user_indexes) = parse_index_response(&body)?;

        let ptbk_url = reqwest::Url::parse_with_params(PTBK_ENDPOINT, &[("uniqid", uniqid.as_str())])
            .map_err(|e| FetchError::Transport(format!("invalid url: {}", e)))?;
        let request = self.request(ptbk_url.as_str(), &cookie, cipher_text.as_deref());
        let key = parse_ptbk_response(&transport.issue(&request).await?)?;
        log::debug!("🔑 Decode key received ({} chars)", key.chars().count());

        Ok(decode_user_indexes(&key, &user_indexes))
    }

    fn request(&self, url: &str, cookie: &str, cipher_text: Option<&str>) -> RequestSpec {
        let mut request = RequestSpec::get(url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "zh-CN,zh;q=0.9")
            .header("User-Agent", DEFAULT_USER_AGENT)
            .header("Referer", REFERER)
            .header("Cookie", cookie);
        if let Some(cipher_text) = cipher_text {
            request = request.header("Cipher-Text", cipher_text);
        }
        request
    }
}

#[async_trait]
impl TrendFetcher for BaiduIndexFetcher {
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
                let result = self.crawl(transport.as_ref(), credentials.as_ref()).await;
                settle_fetch(&self.source, &self.state, result).await
            }
        }
    }

    async fn health(&self) -> FetchHealth {
        self.state.lock().await.health.clone()
    }
}

/// Reject provider-reported errors (`status != 0`)
///
/// Baidu sends `data: ""` alongside error statuses, so the status has to be
/// checked before the body is mapped onto the typed structs.
fn check_status(body: &serde_json::Value) -> Result<(), FetchError> {
    match body.get("status").and_then(|s| s.as_i64()) {
        Some(0) | None => Ok(()),
        Some(status) => {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("no message");
            Err(FetchError::Transport(format!("Baidu status {}: {}", status, message)))
        }
    }
}

fn parse_index_response(body: &[u8]) -> Result<(String, Vec<UserIndex>), FetchError> {
    let raw: serde_json::Value = serde_json::from_slice(body)?;
    check_status(&raw)?;

    let response: IndexResponse = serde_json::from_value(raw)?;
    let uniqid = response
        .data
        .uniqid
        .filter(|u| !u.is_empty())
        .ok_or_else(|| FetchError::Decode("missing uniqid".to_string()))?;
    Ok((uniqid, response.data.user_indexes))
}

fn parse_ptbk_response(body: &[u8]) -> Result<String, FetchError> {
    let raw: serde_json::Value = serde_json::from_slice(body)?;
    check_status(&raw)?;

    let response: PtbkResponse = serde_json::from_value(raw)?;
    response
        .data
        .filter(|k| !k.is_empty())
        .ok_or_else(|| FetchError::Decode("missing decode key".to_string()))
}

/// Source label a decoded sub-series is stored under
fn series_source(keyword: &str, kind: &str) -> String {
    format!("{}-{}-{}", SOURCE_ID, keyword, kind)
}

/// Decode every series kind of every keyword
///
/// A series with an unreadable start date is skipped; the others still
/// come through.
fn decode_user_indexes(key: &str, user_indexes: &[UserIndex]) -> Vec<DataPoint> {
    let mut points = Vec::new();

    for user_index in user_indexes {
        let Some(word) = user_index.word.first() else {
            continue;
        };

        let kinds = [
            ("all", &user_index.all),
            ("pc", &user_index.pc),
            ("wise", &user_index.wise),
        ];
        for (kind, series) in kinds {
            let Some(series) = series else {
                continue;
            };
            let source = series_source(&word.name, kind);
            let start = match parse_day(&series.start_date, "%Y-%m-%d") {
                Ok(start) => start,
                Err(e) => {
                    log::warn!("⚠️  Skipping {}: {}", source, e);
                    continue;
                }
            };
            let decoded = parse_decoded_series(&decode(key, &series.data), start, &source);
            log::debug!(
                "📊 {}: {} points ({} → {})",
                source,
                decoded.len(),
                series.start_date,
                series.end_date
            );
            points.extend(decoded);
        }
    }

    points
}
