//! In-memory per-source series store
//!
//! Series are append-only across fetch cycles. Insertion order is not
//! guaranteed to be chronological, so readers that need a window must sort
//! (see [`SeriesStore::sorted_series`]).

use super::types::{DataPoint, SourceId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store handle shared between the orchestrator (single writer) and readers
pub type SharedSeriesStore = Arc<RwLock<SeriesStore>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesStore {
    series: HashMap<SourceId, Vec<DataPoint>>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSeriesStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Append points to a source's series, creating it if absent
    ///
    /// Empty batches are ignored so a quiet source never gets an empty entry.
    /// Returns the number of appended points.
    pub fn append(&mut self, source: &str, points: Vec<DataPoint>) -> usize {
        if points.is_empty() {
            return 0;
        }
        let count = points.len();
        self.series
            .entry(source.to_string())
            .or_default()
            .extend(points);
        count
    }

    /// Series for a source in insertion order (empty if unknown)
    pub fn series(&self, source: &str) -> &[DataPoint] {
        self.series.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy of a source's series sorted by ascending timestamp
    pub fn sorted_series(&self, source: &str) -> Vec<DataPoint> {
        let mut points = self.series(source).to_vec();
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        points
    }

    /// All known sources, sorted by name
    pub fn sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<SourceId> = self.series.keys().cloned().collect();
        sources.sort();
        sources
    }

    pub fn point_count(&self, source: &str) -> usize {
        self.series.get(source).map(Vec::len).unwrap_or(0)
    }

    pub fn total_points(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Most recent point (by timestamp) of every non-empty source
    pub fn latest_points(&self) -> HashMap<SourceId, DataPoint> {
        self.series
            .iter()
            .filter_map(|(source, points)| {
                points
                    .iter()
                    .max_by(|a, b| a.timestamp.cmp(&b.timestamp))
                    .map(|p| (source.clone(), p.clone()))
            })
            .collect()
    }

    /// Drop one source's series; returns how many points were removed
    pub fn clear_source(&mut self, source: &str) -> usize {
        self.series.remove(source).map(|p| p.len()).unwrap_or(0)
    }

    pub fn clear_all(&mut self) {
        self.series.clear();
    }
}
