//! TrendFlow Runtime
//!
//! Wires the signal pipeline together:
//! - Builds the fetchers (Google Trends always, Baidu index when enabled)
//! - Registers the four reference strategies
//! - Spawns the polling scheduler and a notification consumer
//! - Waits for CTRL+C, then stops the scheduler between cycles
//!
//! Usage:
//!   cargo run --release --bin trendflow_runtime
//!
//! Set `TRENDFLOW_FETCH_MODE=replay` to run against built-in replay data
//! instead of the network. See `config.rs` for all variables.

use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use trendflow::fetcher::transport::{ChainedCredentialStore, EnvCredentialStore, FileCredentialStore};
use trendflow::fetcher::{
    baidu, google, BaiduIndexFetcher, CredentialStore, FetchBackend, GoogleTrendsFetcher,
    HttpTransport, ReplayFeed, Transport,
};
use trendflow::pipeline::{
    run_polling, ChannelSink, FanoutSink, LogSink, MessageInbox, SignalPipeline,
};
use trendflow::{FetchOrchestrator, RuntimeConfig, StrategyEngine};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(35);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 TrendFlow Runtime");

    let config = RuntimeConfig::from_env()?;
    info!("   ├─ Fetch mode: {:?}", config.fetch_mode);
    info!("   ├─ Poll interval: {:?}", config.poll_interval);
    info!("   ├─ Fetch timeout: {:?}", config.fetch_timeout);
    info!("   ├─ Signal cooldown: {:?}", config.signal_cooldown);
    info!("   ├─ Reference source: {}", config.reference_source);
    info!("   └─ Baidu index: {}", if config.enable_baidu { "enabled" } else { "disabled" });

    let mut orchestrator = FetchOrchestrator::new(config.fetch_timeout);
    for fetcher in build_fetchers(&config)? {
        orchestrator.register(fetcher);
    }
    info!("✅ {} fetchers registered", orchestrator.fetcher_count());

    let mut updates = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => info!(
                    "📈 Series updated: +{} points ({} total)",
                    update.new_points, update.total_points
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("⚠️  Update listener lagged, skipped {} updates", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cooldown = chrono::Duration::from_std(config.signal_cooldown)?;
    let engine = StrategyEngine::with_reference_strategies(&config.reference_source, cooldown);

    let inbox = MessageInbox::new();
    let (channel_sink, mut signals) = ChannelSink::channel(config.signal_channel_buffer);
    let sink = FanoutSink::new()
        .with(LogSink)
        .with(Arc::clone(&inbox))
        .with(channel_sink);

    // Notification consumer
    let consumer = tokio::spawn(async move {
        while let Some(event) = signals.recv().await {
            info!(
                "🔔 [{} {}] {} ({})",
                event.strength.as_str(),
                event.direction.as_str(),
                event.message,
                event.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    });

    let pipeline = Arc::new(SignalPipeline::new(orchestrator, engine, Arc::new(sink)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_polling(
        Arc::clone(&pipeline),
        config.poll_interval,
        shutdown_rx,
    ));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, scheduler).await {
        Ok(Ok(cycles)) => info!("✅ Scheduler stopped after {} cycles", cycles),
        Ok(Err(e)) => error!("❌ Scheduler task failed: {}", e),
        Err(_) => warn!("⚠️  Scheduler did not stop within {:?}", SHUTDOWN_GRACE),
    }

    for (source, health) in pipeline.orchestrator().fetcher_health().await {
        info!(
            "   {} → {} ok / {} failed{}",
            source,
            health.successes,
            health.failures,
            health
                .last_error
                .map(|e| format!(" (last error: {})", e))
                .unwrap_or_default()
        );
    }
    info!("📬 {} messages in inbox", inbox.len());
    // Last handle to the sinks: closes the signal channel
    drop(pipeline);
    let _ = tokio::time::timeout(Duration::from_secs(2), consumer).await;

    info!("✅ TrendFlow runtime stopped");
    Ok(())
}

fn build_fetchers(
    config: &RuntimeConfig,
) -> Result<Vec<Arc<dyn trendflow::TrendFetcher>>, Box<dyn std::error::Error>> {
    let mut fetchers: Vec<Arc<dyn trendflow::TrendFetcher>> = Vec::new();

    if config.is_replay() {
        let feed = ReplayFeed::new(google::SOURCE_ID, &google::REPLAY_VALUES, google::REPLAY_INDEX);
        fetchers.push(Arc::new(GoogleTrendsFetcher::new(
            &config.google_keyword,
            FetchBackend::replay(feed),
        )));

        if config.enable_baidu {
            let source = BaiduIndexFetcher::replay_source(&config.baidu_keyword);
            let feed = ReplayFeed::new(&source, &baidu::REPLAY_VALUES, baidu::REPLAY_INDEX);
            fetchers.push(Arc::new(BaiduIndexFetcher::new(
                &config.baidu_keyword,
                FetchBackend::replay(feed),
            )));
        }
        return Ok(fetchers);
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(HTTP_TIMEOUT)?);
    let credentials: Arc<dyn CredentialStore> = Arc::new(ChainedCredentialStore::new(vec![
        Box::new(FileCredentialStore::new(&config.credentials_dir)),
        Box::new(EnvCredentialStore),
    ]));
    info!("🔑 Credentials: {} (then environment)", config.credentials_dir.display());

    fetchers.push(Arc::new(GoogleTrendsFetcher::new(
        &config.google_keyword,
        FetchBackend::live(Arc::clone(&transport), Arc::clone(&credentials)),
    )));
    if config.enable_baidu {
        fetchers.push(Arc::new(BaiduIndexFetcher::new(
            &config.baidu_keyword,
            FetchBackend::live(transport, credentials),
        )));
    }

    Ok(fetchers)
}
