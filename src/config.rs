//! Runtime configuration from environment variables
//!
//! Environment variables (all optional):
//! - `TRENDFLOW_FETCH_MODE` - `live` or `replay` (default: live)
//! - `POLL_INTERVAL_SECS` - sleep between fetch cycles (default: 10)
//! - `FETCH_TIMEOUT_SECS` - per-fetcher timeout (default: 30)
//! - `SIGNAL_COOLDOWN_SECS` - signal hysteresis window (default: 1800)
//! - `STRATEGY_REFERENCE_SOURCE` - series the strategies key off (default: google_trends)
//! - `GOOGLE_TRENDS_KEYWORD` - SerpApi query (default: popmart)
//! - `BAIDU_INDEX_KEYWORD` - Baidu index keyword (default: 泡泡玛特)
//! - `ENABLE_BAIDU_INDEX` - register the Baidu fetcher (default: false)
//! - `CREDENTIALS_DIR` - directory of credential files (default: credentials)
//! - `SIGNAL_CHANNEL_BUFFER` - signal channel capacity (default: 100)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where fetchers get their data from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Live,
    Replay,
}

impl FromStr for FetchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(FetchMode::Live),
            "replay" | "mock" => Ok(FetchMode::Replay),
            other => Err(ConfigError::InvalidValue(format!(
                "TRENDFLOW_FETCH_MODE must be 'live' or 'replay', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub fetch_mode: FetchMode,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub signal_cooldown: Duration,
    pub reference_source: String,
    pub google_keyword: String,
    pub baidu_keyword: String,
    pub enable_baidu: bool,
    pub credentials_dir: PathBuf,
    pub signal_channel_buffer: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let fetch_mode = match lookup("TRENDFLOW_FETCH_MODE") {
            Some(raw) => raw.parse()?,
            None => FetchMode::Live,
        };

        let poll_interval = Duration::from_secs(positive(&lookup, "POLL_INTERVAL_SECS", 10)?);
        let fetch_timeout = Duration::from_secs(positive(&lookup, "FETCH_TIMEOUT_SECS", 30)?);
        let signal_cooldown = Duration::from_secs(positive(&lookup, "SIGNAL_COOLDOWN_SECS", 1800)?);
        let signal_channel_buffer = positive(&lookup, "SIGNAL_CHANNEL_BUFFER", 100)? as usize;

        let reference_source = non_blank(&lookup, "STRATEGY_REFERENCE_SOURCE", "google_trends")?;
        let google_keyword = non_blank(&lookup, "GOOGLE_TRENDS_KEYWORD", "popmart")?;
        let baidu_keyword = non_blank(&lookup, "BAIDU_INDEX_KEYWORD", "泡泡玛特")?;

        let enable_baidu = match lookup("ENABLE_BAIDU_INDEX") {
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(format!("ENABLE_BAIDU_INDEX must be true or false, got '{}'", raw))
            })?,
            None => false,
        };

        let credentials_dir = lookup("CREDENTIALS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("credentials"));

        Ok(Self {
            fetch_mode,
            poll_interval,
            fetch_timeout,
            signal_cooldown,
            reference_source,
            google_keyword,
            baidu_keyword,
            enable_baidu,
            credentials_dir,
            signal_channel_buffer,
        })
    }

    pub fn is_replay(&self) -> bool {
        self.fetch_mode == FetchMode::Replay
    }
}

/// Parse a strictly positive integer, falling back to `default` when unset
fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue(format!("{} must be greater than 0", name))),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::InvalidValue(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

/// A variable that may be unset (default applies) but not set to blank
fn non_blank(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        None => Ok(default.to_string()),
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::MissingVariable(name.to_string())),
        Some(raw) => Ok(raw.trim().to_string()),
    }
}
