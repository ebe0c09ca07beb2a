//! Polling scheduler
//!
//! Drives one fetch cycle, sleeps for the configured interval, repeats. A
//! shutdown request is honoured between cycles: an in-flight cycle always
//! completes (merge, evaluation and signal dispatch included) before the
//! loop exits.

use super::orchestrator::FetchOrchestrator;
use super::sink::SignalSink;
use crate::strategy::StrategyEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub new_points: usize,
    pub signals: usize,
}

/// Orchestrator + strategy engine + sink, run as one unit per tick
pub struct SignalPipeline {
    orchestrator: FetchOrchestrator,
    engine: Mutex<StrategyEngine>,
    sink: Arc<dyn SignalSink>,
}

impl SignalPipeline {
    pub fn new(
        orchestrator: FetchOrchestrator,
        engine: StrategyEngine,
        sink: Arc<dyn SignalSink>,
    ) -> Self {
        Self {
            orchestrator,
            engine: Mutex::new(engine),
            sink,
        }
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    /// Fetch, merge and, if anything new arrived, evaluate at the current time
    pub async fn tick(&self) -> TickReport {
        self.run_tick(None).await
    }

    /// Same as [`tick`](Self::tick) with an explicit evaluation time
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        self.run_tick(Some(now)).await
    }

    async fn run_tick(&self, now: Option<DateTime<Utc>>) -> TickReport {
        let mut engine = self.engine.lock().await;
        let (new_points, accepted) = self
            .orchestrator
            .run_cycle_then(|store| engine.evaluate(store, now.unwrap_or_else(Utc::now)))
            .await;
        drop(engine);

        let accepted = accepted.unwrap_or_default();
        let signals = accepted.len();
        for event in accepted {
            self.sink.emit(event);
        }

        TickReport { new_points, signals }
    }
}

/// Run the polling loop until `shutdown` flips to `true` (or its sender is
/// dropped). Returns the number of completed cycles.
pub async fn run_polling(
    pipeline: Arc<SignalPipeline>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    log::info!("⏰ Starting polling scheduler (interval: {:?})", interval);
    let mut cycles = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let report = pipeline.tick().await;
        cycles += 1;
        if report.signals > 0 {
            log::info!(
                "📊 Cycle {}: {} new points, {} signals dispatched",
                cycles,
                report.new_points,
                report.signals
            );
        } else {
            log::debug!("Cycle {}: {} new points", cycles, report.new_points);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("🛑 Polling scheduler stopped after {} cycles", cycles);
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchBackend, GoogleTrendsFetcher, ReplayFeed};
    use crate::pipeline::sink::MessageInbox;
    use crate::pipeline::store::SeriesStore;
    use crate::pipeline::types::{SignalDirection, SignalEvent, SignalStrength};
    use crate::strategy::Strategy;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOURCE: &str = "google_trends";

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 31, 0, 0, 0).unwrap()
    }

    fn replay_fetcher(values: &[f64], index: usize) -> Arc<GoogleTrendsFetcher> {
        let feed = ReplayFeed::seeded(SOURCE, values, index, anchor(), 11);
        Arc::new(GoogleTrendsFetcher::new("popmart", FetchBackend::replay(feed)))
    }

    fn pipeline_with(
        fetcher: Arc<GoogleTrendsFetcher>,
        engine: StrategyEngine,
    ) -> (Arc<SignalPipeline>, Arc<MessageInbox>) {
        let mut orchestrator = FetchOrchestrator::new(Duration::from_secs(5));
        orchestrator.register(fetcher);
        let inbox = MessageInbox::new();
        let pipeline = SignalPipeline::new(orchestrator, engine, inbox.clone());
        (Arc::new(pipeline), inbox)
    }

    struct CountingStrategy(Arc<AtomicUsize>);

    impl Strategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }
        fn direction(&self) -> SignalDirection {
            SignalDirection::Buy
        }
        fn strength(&self) -> SignalStrength {
            SignalStrength::Normal
        }
        fn execute(&self, _store: &SeriesStore, now: DateTime<Utc>) -> SignalEvent {
            self.0.fetch_add(1, Ordering::SeqCst);
            SignalEvent {
                triggered: false,
                direction: SignalDirection::Buy,
                strength: SignalStrength::Normal,
                message: String::new(),
                timestamp: now,
                strategy_name: "counting".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_tick_dispatches_accepted_signal() {
        let fetcher = replay_fetcher(&[40.0, 40.0, 40.0, 40.0, 40.0, 50.0, 100.0], 6);
        let engine = StrategyEngine::with_reference_strategies(SOURCE, chrono::Duration::minutes(30));
        let (pipeline, inbox) = pipeline_with(fetcher, engine);

        // Six points of history: not enough for a window
        let first = pipeline.tick_at(anchor()).await;
        assert_eq!(first, TickReport { new_points: 6, signals: 0 });

        let second = pipeline.tick_at(anchor()).await;
        assert_eq!(second, TickReport { new_points: 1, signals: 1 });
        assert_eq!(inbox.messages()[0].title, "Strong buy signal");
    }

    #[tokio::test]
    async fn test_quiet_cycle_skips_evaluation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = StrategyEngine::new(chrono::Duration::minutes(30));
        engine.register(Box::new(CountingStrategy(calls.clone())));

        let mut orchestrator = FetchOrchestrator::new(Duration::from_secs(5));
        orchestrator.register(replay_fetcher(&[50.0, 51.0], 2));
        let pipeline = SignalPipeline::new(orchestrator, engine, MessageInbox::new());

        assert_eq!(pipeline.tick().await.new_points, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let empty = SignalPipeline::new(
            FetchOrchestrator::new(Duration::from_secs(5)),
            {
                let mut engine = StrategyEngine::new(chrono::Duration::minutes(30));
                engine.register(Box::new(CountingStrategy(calls.clone())));
                engine
            },
            MessageInbox::new(),
        );
        assert_eq!(empty.tick().await, TickReport::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_polling_runs_until_shutdown() {
        let fetcher = replay_fetcher(&[40.0, 47.0, 51.0], 1);
        let engine = StrategyEngine::with_reference_strategies(SOURCE, chrono::Duration::minutes(30));
        let (pipeline, _inbox) = pipeline_with(fetcher, engine);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_polling(pipeline.clone(), Duration::from_millis(10), rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(cycles >= 2, "only {} cycles", cycles);
        let store = pipeline.orchestrator().store();
        // One point of history, then one new point per later cycle
        assert_eq!(store.read().await.point_count(SOURCE) as u64, cycles);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_runs_nothing() {
        let fetcher = replay_fetcher(&[1.0], 0);
        let (pipeline, _inbox) = pipeline_with(fetcher, StrategyEngine::new(chrono::Duration::minutes(30)));

        let (_tx, rx) = watch::channel(true);
        assert_eq!(run_polling(pipeline, Duration::from_millis(10), rx).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_loop() {
        let fetcher = replay_fetcher(&[1.0], 0);
        let (pipeline, _inbox) = pipeline_with(fetcher, StrategyEngine::new(chrono::Duration::minutes(30)));

        let (tx, rx) = watch::channel(false);
        drop(tx);
        let cycles = tokio::time::timeout(
            Duration::from_secs(5),
            run_polling(pipeline, Duration::from_secs(3600), rx),
        )
        .await
        .unwrap();
        assert_eq!(cycles, 1);
    }
}
