//! Concurrent fetch cycle
//!
//! One cycle:
//! 1. Spawn every registered fetcher on its own task, each under a timeout
//! 2. Await all of them (no early cancellation)
//! 3. Take the store's write guard and merge the results serially
//! 4. Optionally evaluate over the merged store before the guard is released
//!
//! Fetcher tasks never touch the store. A fetcher that times out or panics
//! contributes zero points and is counted in [`SourceHealth`].

use super::store::{SeriesStore, SharedSeriesStore};
use super::types::{DataPoint, SeriesUpdate, SourceId};
use crate::fetcher::{FetchHealth, TrendFetcher};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Orchestrator-side counters for one fetcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHealth {
    pub cycles: u64,
    pub points: u64,
    pub timeouts: u64,
    pub panics: u64,
}

pub struct FetchOrchestrator {
    fetchers: Vec<Arc<dyn TrendFetcher>>,
    store: SharedSeriesStore,
    fetch_timeout: Duration,
    updates: broadcast::Sender<SeriesUpdate>,
    health: Mutex<HashMap<SourceId, SourceHealth>>,
}

impl FetchOrchestrator {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self::with_store(SeriesStore::shared(), fetch_timeout)
    }

    pub fn with_store(store: SharedSeriesStore, fetch_timeout: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            fetchers: Vec::new(),
            store,
            fetch_timeout,
            updates,
            health: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, fetcher: Arc<dyn TrendFetcher>) {
        log::info!("📥 Registered fetcher: {}", fetcher.source_id());
        self.fetchers.push(fetcher);
    }

    pub fn fetcher_count(&self) -> usize {
        self.fetchers.len()
    }

    /// Shared handle for query-side readers
    pub fn store(&self) -> SharedSeriesStore {
        Arc::clone(&self.store)
    }

    /// Subscribe to "series updated" notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SeriesUpdate> {
        self.updates.subscribe()
    }

    /// Run one fetch cycle, returning the number of merged points
    ///
    /// Zero is a valid quiet cycle; the store is left untouched.
    pub async fn run_cycle(&self) -> usize {
        self.run_cycle_then(|_| ()).await.0
    }

    /// Run one fetch cycle and, if anything was merged, call `on_new` with the
    /// merged store before the write guard is released
    ///
    /// Merge and evaluation form one transaction: no other cycle can write
    /// in between.
    pub async fn run_cycle_then<R>(
        &self,
        on_new: impl FnOnce(&SeriesStore) -> R,
    ) -> (usize, Option<R>) {
        let batches = self.fan_out().await;

        let mut store = self.store.write().await;
        let mut merged = 0;
        for batch in batches {
            for (source, points) in group_by_source(batch) {
                merged += store.append(&source, points);
            }
        }

        if merged == 0 {
            log::debug!("💤 Quiet cycle: no new points");
            return (0, None);
        }

        let total = store.total_points();
        log::info!("🔄 Cycle merged {} new points ({} total)", merged, total);
        let outcome = on_new(&store);

        // No subscribers is fine
        let _ = self.updates.send(SeriesUpdate {
            new_points: merged,
            total_points: total,
            at: Utc::now(),
        });

        (merged, Some(outcome))
    }

    async fn fan_out(&self) -> Vec<Vec<DataPoint>> {
        let handles: Vec<_> = self
            .fetchers
            .iter()
            .map(|fetcher| {
                let fetcher = Arc::clone(fetcher);
                let timeout = self.fetch_timeout;
                tokio::spawn(async move { tokio::time::timeout(timeout, fetcher.fetch()).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (fetcher, handle) in self.fetchers.iter().zip(handles) {
            outcomes.push((fetcher.source_id().to_string(), handle.await));
        }

        // Counters are only locked once every task has finished
        let mut batches = Vec::with_capacity(outcomes.len());
        let mut health = self.health.lock().await;

        for (source, outcome) in outcomes {
            let entry = health.entry(source.clone()).or_default();
            entry.cycles += 1;

            match outcome {
                Ok(Ok(points)) => {
                    entry.points += points.len() as u64;
                    batches.push(points);
                }
                Ok(Err(_)) => {
                    entry.timeouts += 1;
                    log::warn!(
                        "⏱️  {} fetch timed out after {:?}, treating as empty",
                        source,
                        self.fetch_timeout
                    );
                }
                Err(e) => {
                    entry.panics += 1;
                    log::error!("❌ {} fetch task failed: {}", source, e);
                }
            }
        }

        batches
    }

    pub async fn source_health(&self) -> HashMap<SourceId, SourceHealth> {
        self.health.lock().await.clone()
    }

    /// Per-fetcher success/failure counters as reported by the fetchers
    pub async fn fetcher_health(&self) -> Vec<(SourceId, FetchHealth)> {
        let mut report = Vec::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            report.push((fetcher.source_id().to_string(), fetcher.health().await));
        }
        report
    }
}

/// Split a fetcher's batch into per-source runs, keeping first-seen order
fn group_by_source(points: Vec<DataPoint>) -> Vec<(SourceId, Vec<DataPoint>)> {
    let mut groups: Vec<(SourceId, Vec<DataPoint>)> = Vec::new();
    for point in points {
        match groups.iter_mut().find(|(source, _)| *source == point.source) {
            Some((_, group)) => group.push(point),
            None => groups.push((point.source.clone(), vec![point])),
        }
    }
    groups
}
