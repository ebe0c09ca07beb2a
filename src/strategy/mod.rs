//! # Strategy engine
//!
//! Strategies are stateless analyzers over the merged series. All memory
//! (the per-direction cooldown history) lives in [`StrategyEngine`].
//!
//! Evaluation order per cycle: every Strong strategy, then every Normal
//! strategy, each group in registration order. History is updated as soon as
//! a signal is accepted, so a Strong accept suppresses a Normal signal in
//! the same direction later in the same cycle. All strategies of one cycle
//! are evaluated against the same `now`.

pub mod cooldown;
pub mod threshold;

pub use cooldown::{AcceptedTrigger, CooldownTracker};
pub use threshold::ThresholdStrategy;

use crate::pipeline::store::SeriesStore;
use crate::pipeline::types::{SignalDirection, SignalEvent, SignalStrength};
use chrono::{DateTime, Duration, Utc};

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn direction(&self) -> SignalDirection;
    fn strength(&self) -> SignalStrength;

    /// Evaluate against the current series; always returns a result
    fn execute(&self, store: &SeriesStore, now: DateTime<Utc>) -> SignalEvent;
}

pub struct StrategyEngine {
    strategies: Vec<Box<dyn Strategy>>,
    cooldown: CooldownTracker,
}

impl StrategyEngine {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            cooldown: CooldownTracker::new(cooldown),
        }
    }

    /// Engine with the four reference strategies keyed off one source
    pub fn with_reference_strategies(reference_source: &str, cooldown: Duration) -> Self {
        let mut engine = Self::new(cooldown);
        engine.register(Box::new(ThresholdStrategy::strong_buy(reference_source)));
        engine.register(Box::new(ThresholdStrategy::normal_buy(reference_source)));
        engine.register(Box::new(ThresholdStrategy::normal_sell(reference_source)));
        engine.register(Box::new(ThresholdStrategy::strong_sell(reference_source)));
        engine
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        log::info!(
            "📐 Registered strategy: {} ({} {})",
            strategy.name(),
            strategy.strength().as_str(),
            strategy.direction().as_str()
        );
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn last_accepted(&self, direction: SignalDirection) -> Option<AcceptedTrigger> {
        self.cooldown.last_accepted(direction)
    }

    /// Run every strategy and return the signals that passed the cooldown
    pub fn evaluate(&mut self, store: &SeriesStore, now: DateTime<Utc>) -> Vec<SignalEvent> {
        let mut accepted = Vec::new();

        for strength in [SignalStrength::Strong, SignalStrength::Normal] {
            for strategy in self.strategies.iter().filter(|s| s.strength() == strength) {
                let event = strategy.execute(store, now);
                if !event.triggered {
                    log::debug!("{}: {}", event.strategy_name, event.message);
                    continue;
                }

                if self.cooldown.admit(event.direction, event.strength, now) {
                    log::info!("📣 {} fired: {}", event.strategy_name, event.message);
                    accepted.push(event);
                } else {
                    log::info!("🔕 {} suppressed by cooldown", event.strategy_name);
                }
            }
        }

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DataPoint;
    use chrono::TimeZone;

    const SOURCE: &str = "google_trends";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap()
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

    /// Fires unconditionally with a fixed identity
    struct Always(&'static str, SignalDirection, SignalStrength);

    impl Strategy for Always {
        fn name(&self) -> &str {
            self.0
        }
        fn direction(&self) -> SignalDirection {
            self.1
        }
        fn strength(&self) -> SignalStrength {
            self.2
        }
        fn execute(&self, _store: &SeriesStore, now: DateTime<Utc>) -> SignalEvent {
            SignalEvent {
                triggered: true,
                direction: self.1,
                strength: self.2,
                message: "always".to_string(),
                timestamp: now,
                strategy_name: self.0.to_string(),
            }
        }
    }

    #[test]
    fn test_strong_group_runs_before_normal() {
        let mut engine = StrategyEngine::new(Duration::minutes(30));
        engine.register(Box::new(Always("n_buy", SignalDirection::Buy, SignalStrength::Normal)));
        engine.register(Box::new(Always("s_buy", SignalDirection::Buy, SignalStrength::Strong)));

        let accepted = engine.evaluate(&SeriesStore::new(), now());
        let names: Vec<&str> = accepted.iter().map(|e| e.strategy_name.as_str()).collect();
        // Strong accepted first, then the same-cycle Normal is inside its cooldown
        assert_eq!(names, vec!["s_buy"]);
    }

    #[test]
    fn test_both_strengths_fire_for_large_jump() {
        // avg7 = 50, latest = 100 → 100%: both buy strategies trigger
        let store = store_with(&[40.0, 40.0, 40.0, 40.0, 40.0, 50.0, 100.0]);
        let mut engine = StrategyEngine::with_reference_strategies(SOURCE, Duration::minutes(30));

        let accepted = engine.evaluate(&store, now());
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].strategy_name, "strong_buy");
        assert_eq!(
            engine.last_accepted(SignalDirection::Buy).unwrap().strength,
            SignalStrength::Strong
        );
    }

    #[test]
    fn test_repeat_evaluation_respects_cooldown() {
        let store = store_with(&[45.0, 45.0, 45.0, 45.0, 50.0, 50.0, 70.0]);
        let mut engine = StrategyEngine::with_reference_strategies(SOURCE, Duration::minutes(30));

        assert_eq!(engine.evaluate(&store, now()).len(), 1);
        assert!(engine.evaluate(&store, now() + Duration::minutes(10)).is_empty());
        assert_eq!(engine.evaluate(&store, now() + Duration::minutes(30)).len(), 1);
    }

    #[test]
    fn test_quiet_series_accepts_nothing() {
        let store = store_with(&[50.0; 10]);
        let mut engine = StrategyEngine::with_reference_strategies(SOURCE, Duration::minutes(30));
        assert!(engine.evaluate(&store, now()).is_empty());
        assert_eq!(engine.last_accepted(SignalDirection::Buy), None);
    }

    #[test]
    fn test_reference_strategy_names() {
        let engine = StrategyEngine::with_reference_strategies(SOURCE, Duration::minutes(30));
        assert_eq!(
            engine.strategy_names(),
            vec!["strong_buy", "normal_buy", "normal_sell", "strong_sell"]
        );
    }
}
