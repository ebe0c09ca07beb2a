//! Percentage-over-7-day-average threshold strategies
//!
//! All four reference strategies share one shape and differ only in
//! direction, strength and threshold:
//!
//! | strategy     | pct                           | fires when  |
//! |--------------|-------------------------------|-------------|
//! | Strong buy   | (latest - avg7) / avg7 * 100  | pct > 80    |
//! | Normal buy   | (latest - avg7) / avg7 * 100  | pct > 30    |
//! | Normal sell  | (avg7 - latest) / avg7 * 100  | pct > 30    |
//! | Strong sell  | (avg7 - latest) / avg7 * 100  | pct > 80    |

use super::Strategy;
use crate::pipeline::store::SeriesStore;
use crate::pipeline::types::{SignalDirection, SignalEvent, SignalStrength};
use chrono::{DateTime, Utc};

/// Number of most recent points the average is taken over
pub const WINDOW_POINTS: usize = 7;
pub const STRONG_THRESHOLD_PCT: f64 = 80.0;
pub const NORMAL_THRESHOLD_PCT: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    name: String,
    direction: SignalDirection,
    strength: SignalStrength,
    threshold_pct: f64,
    reference_source: String,
}

impl ThresholdStrategy {
    pub fn new(
        direction: SignalDirection,
        strength: SignalStrength,
        threshold_pct: f64,
        reference_source: &str,
    ) -> Self {
        let name = format!(
            "{}_{}",
            strength.as_str().to_lowercase(),
            direction.as_str().to_lowercase()
        );
        Self {
            name,
            direction,
            strength,
            threshold_pct,
            reference_source: reference_source.to_string(),
        }
    }

    pub fn strong_buy(reference_source: &str) -> Self {
        Self::new(SignalDirection::Buy, SignalStrength::Strong, STRONG_THRESHOLD_PCT, reference_source)
    }

    pub fn normal_buy(reference_source: &str) -> Self {
        Self::new(SignalDirection::Buy, SignalStrength::Normal, NORMAL_THRESHOLD_PCT, reference_source)
    }

    pub fn normal_sell(reference_source: &str) -> Self {
        Self::new(SignalDirection::Sell, SignalStrength::Normal, NORMAL_THRESHOLD_PCT, reference_source)
    }

    pub fn strong_sell(reference_source: &str) -> Self {
        Self::new(SignalDirection::Sell, SignalStrength::Strong, STRONG_THRESHOLD_PCT, reference_source)
    }

    fn event(&self, triggered: bool, message: String, now: DateTime<Utc>) -> SignalEvent {
        SignalEvent {
            triggered,
            direction: self.direction,
            strength: self.strength,
            message,
            timestamp: now,
            strategy_name: self.name.clone(),
        }
    }
}

impl Strategy for ThresholdStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn direction(&self) -> SignalDirection {
        self.direction
    }

    fn strength(&self) -> SignalStrength {
        self.strength
    }

    fn execute(&self, store: &SeriesStore, now: DateTime<Utc>) -> SignalEvent {
        let series = store.sorted_series(&self.reference_source);
        if series.len() < WINDOW_POINTS {
            let message = format!(
                "Insufficient data: {} has {} points, need {}",
                self.reference_source,
                series.len(),
                WINDOW_POINTS
            );
            return self.event(false, message, now);
        }

        let window = &series[series.len() - WINDOW_POINTS..];
        let avg7 = window.iter().map(|p| p.value).sum::<f64>() / WINDOW_POINTS as f64;
        let latest = window[WINDOW_POINTS - 1].value;

        if avg7 == 0.0 || !avg7.is_finite() {
            let message = format!(
                "Latest {:.1}, 7-day average {:.1}: percentage undefined",
                latest, avg7
            );
            return self.event(false, message, now);
        }

        let pct = match self.direction {
            SignalDirection::Buy => (latest - avg7) / avg7 * 100.0,
            SignalDirection::Sell => (avg7 - latest) / avg7 * 100.0,
        };
        let triggered = pct > self.threshold_pct;

        let verb = match self.direction {
            SignalDirection::Buy => "above",
            SignalDirection::Sell => "below",
        };
        let message = format!(
            "Latest {:.1} is {:.1}% {} the 7-day average {:.1} (threshold {:.1}%)",
            latest, pct, verb, avg7, self.threshold_pct
        );
        self.event(triggered, message, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DataPoint;
    use chrono::{Duration, TimeZone};

    const SOURCE: &str = "google_trends";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap()
    }

    fn store_with(values: &[f64]) -> SeriesStore {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::new(start + Duration::days(i as i64), *v, SOURCE))
            .collect();
        let mut store = SeriesStore::new();
        store.append(SOURCE, points);
        store
    }

    #[test]
    fn test_strong_buy_boundary_is_strict() {
        // avg7 = 350 / 7 = 50, latest = 90 → exactly 80%
        let store = store_with(&[40.0, 40.0, 40.0, 40.0, 50.0, 50.0, 90.0]);
        let result = ThresholdStrategy::strong_buy(SOURCE).execute(&store, now());
        assert!(!result.triggered);
        assert!(result.message.contains("is 80.0% above"), "{}", result.message);

        let store = store_with(&[40.0, 40.0, 40.0, 40.0, 50.0, 50.0, 90.01]);
        let result = ThresholdStrategy::strong_buy(SOURCE).execute(&store, now());
        assert!(result.triggered);
    }

    #[test]
    fn test_strong_sell_boundary_is_strict() {
        // avg7 = 350 / 7 = 50, latest = 10 → exactly 80%
        let store = store_with(&[60.0, 60.0, 60.0, 60.0, 50.0, 50.0, 10.0]);
        assert!(!ThresholdStrategy::strong_sell(SOURCE).execute(&store, now()).triggered);

        let store = store_with(&[60.0, 60.0, 60.0, 60.0, 50.0, 50.0, 9.0]);
        assert!(ThresholdStrategy::strong_sell(SOURCE).execute(&store, now()).triggered);
    }

    #[test]
    fn test_normal_thresholds() {
        // avg7 = 50, latest = 70 → 40%
        let store = store_with(&[45.0, 45.0, 45.0, 45.0, 50.0, 50.0, 70.0]);
        assert!(ThresholdStrategy::normal_buy(SOURCE).execute(&store, now()).triggered);
        assert!(!ThresholdStrategy::strong_buy(SOURCE).execute(&store, now()).triggered);
        assert!(!ThresholdStrategy::normal_sell(SOURCE).execute(&store, now()).triggered);
    }

    #[test]
    fn test_only_last_seven_points_count() {
        let store = store_with(&[1000.0, 1000.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0]);
        let result = ThresholdStrategy::normal_sell(SOURCE).execute(&store, now());
        assert!(!result.triggered);
        assert!(result.message.contains("is 0.0% below"), "{}", result.message);
    }

    #[test]
    fn test_unsorted_series_is_sorted_first() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let mut points: Vec<DataPoint> = [40.0, 40.0, 40.0, 40.0, 50.0, 50.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::new(start + Duration::days(i as i64), *v, SOURCE))
            .collect();
        points.reverse();
        let mut store = SeriesStore::new();
        store.append(SOURCE, points);

        assert!(ThresholdStrategy::strong_buy(SOURCE).execute(&store, now()).triggered);
    }

    #[test]
    fn test_insufficient_data_never_triggers() {
        let store = store_with(&[1.0, 1.0, 1.0, 1.0, 1.0, 500.0]);
        for strategy in [
            ThresholdStrategy::strong_buy(SOURCE),
            ThresholdStrategy::normal_buy(SOURCE),
            ThresholdStrategy::normal_sell(SOURCE),
            ThresholdStrategy::strong_sell(SOURCE),
        ] {
            let result = strategy.execute(&store, now());
            assert!(!result.triggered);
            assert!(result.message.starts_with("Insufficient data"));
        }
    }

    #[test]
    fn test_other_sources_are_ignored() {
        let store = store_with(&[40.0, 40.0, 40.0, 40.0, 50.0, 50.0, 200.0]);
        let result = ThresholdStrategy::strong_buy("baidu_index-popmart-all").execute(&store, now());
        assert!(!result.triggered);
        assert!(result.message.starts_with("Insufficient data"));
    }

    #[test]
    fn test_zero_average_is_not_triggered() {
        let store = store_with(&[0.0; 7]);
        let result = ThresholdStrategy::strong_sell(SOURCE).execute(&store, now());
        assert!(!result.triggered);
        assert!(result.message.contains("undefined"));
    }

    #[test]
    fn test_event_carries_identity() {
        let store = store_with(&[50.0; 7]);
        let result = ThresholdStrategy::normal_sell(SOURCE).execute(&store, now());
        assert_eq!(result.strategy_name, "normal_sell");
        assert_eq!(result.direction, SignalDirection::Sell);
        assert_eq!(result.strength, SignalStrength::Normal);
        assert_eq!(result.timestamp, now());
    }
}
