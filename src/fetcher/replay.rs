//! Deterministic replay feed
//!
//! Stands in for a provider when the runtime is configured with
//! `TRENDFLOW_FETCH_MODE=replay`. The first call returns the "already seen"
//! history (`data[..index]`), each later call returns exactly one point.
//! Once the backing data is exhausted, a new point one day after the last
//! one is synthesized and appended, so the feed never runs dry.

use crate::pipeline::types::DataPoint;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Value range of synthesized points
pub const SYNTHETIC_RANGE: RangeInclusive<f64> = 50.0..=70.0;

#[derive(Debug)]
pub struct ReplayFeed {
    source: String,
    data: Vec<DataPoint>,
    index: usize,
    first_call: bool,
    rng: StdRng,
}

impl ReplayFeed {
    /// Build a feed anchored at the current time
    pub fn new(source: &str, values: &[f64], index: usize) -> Self {
        Self::with_anchor(source, values, index, Utc::now(), StdRng::from_entropy())
    }

    /// Build a feed with an explicit anchor and RNG
    ///
    /// Value `i` is dated `anchor + (i - index)` days, so the first "new"
    /// point lands on the anchor itself.
    pub fn with_anchor(
        source: &str,
        values: &[f64],
        index: usize,
        anchor: DateTime<Utc>,
        rng: StdRng,
    ) -> Self {
        let data = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let offset = i as i64 - index as i64;
                DataPoint::new(anchor + Duration::days(offset), *value, source)
            })
            .collect();

        Self {
            source: source.to_string(),
            data,
            index,
            first_call: true,
            rng,
        }
    }

    /// Seeded feed for tests and reproducible demos
    pub fn seeded(source: &str, values: &[f64], index: usize, anchor: DateTime<Utc>, seed: u64) -> Self {
        Self::with_anchor(source, values, index, anchor, StdRng::seed_from_u64(seed))
    }

    pub fn next_batch(&mut self) -> Vec<DataPoint> {
        if self.first_call {
            self.first_call = false;
            if self.index > 0 {
                // An index past the end means the whole backing data is history
                self.index = self.index.min(self.data.len());
                return self.data[..self.index].to_vec();
            }
        }

        if self.index < self.data.len() {
            let point = self.data[self.index].clone();
            self.index += 1;
            return vec![point];
        }

        let date = self
            .data
            .last()
            .map(|p| p.timestamp + Duration::days(1))
            .unwrap_or_else(Utc::now);
        let value = self.rng.gen_range(SYNTHETIC_RANGE);
        let point = DataPoint::new(date, value, self.source.as_str());
        self.data.push(point.clone());
        self.index = self.data.len();
        vec![point]
    }

    /// Number of points in the backing data, synthesized ones included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
