//! Core data structures shared by fetchers, the orchestrator and strategies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of a data provider series, e.g. `google_trends` or
/// `baidu_index-popmart-all`
pub type SourceId = String;

/// A single observation of the popularity metric
///
/// Immutable once created. `value` has no enforced range; the raw scale
/// differs between providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub source: SourceId,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64, source: impl Into<SourceId>) -> Self {
        Self {
            timestamp,
            value,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalDirection {
    Buy,
    Sell,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
        }
    }
}

/// Severity tier of a signal; each tier has its own trigger threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalStrength {
    Normal,
    Strong,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Normal => "NORMAL",
            SignalStrength::Strong => "STRONG",
        }
    }
}

/// Result of one strategy evaluation
///
/// Produced on every evaluation, triggered or not, and consumed
/// immediately by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub triggered: bool,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub strategy_name: String,
}

/// Published after every cycle that merged at least one new point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesUpdate {
    pub new_points: usize,
    pub total_points: usize,
    pub at: DateTime<Utc>,
}
