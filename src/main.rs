// =============================================================================
// SMC Sentinel: Main Entry Point
// =============================================================================
//
// Polls the configured symbols every `poll_seconds`, runs one pipeline cycle
// per tick and flushes the signal store on Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod config;
mod features;
mod gates;
mod indicators;
mod market_data;
mod news;
mod pipeline;
mod ports;
mod regime;
mod scoring;
mod signal;
mod types;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use crate::news::EventCalendar;
use crate::pipeline::{Ports, SignalPipeline};
use crate::ports::{LogNotifier, MemorySignalStore, NewsCalendar, NoNews, ReplayProvider, RetryingProvider};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SMC_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();
    init_tracing();

    info!("SMC Sentinel starting up");

    let config_path = std::env::var("SMC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = EngineConfig::load_or_default(&config_path);
    config.apply_env();

    info!(
        symbols = ?config.symbols,
        regime_symbol = ?config.regime_symbol(),
        poll_seconds = config.poll_seconds,
        "Configured symbols"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let replay = ReplayProvider::load_dir(&config.data_dir)
        .with_context(|| format!("failed to load market data from {}", config.data_dir.display()))?;
    let provider = RetryingProvider::new(replay)
        .with_retries(config.provider.max_retries)
        .with_min_coverage(config.provider.min_coverage)
        .with_retry_delay(config.provider.retry_delay());

    let store = Arc::new(
        MemorySignalStore::open(&config.store_path)
            .with_context(|| format!("failed to open signal store {}", config.store_path.display()))?,
    );

    let calendar: Arc<dyn NewsCalendar> = if config.news.enabled {
        match EventCalendar::load(&config.news) {
            Ok(calendar) => Arc::new(calendar),
            Err(e) => {
                warn!(error = %e, "News calendar unavailable, blackout checks disabled");
                Arc::new(NoNews)
            }
        }
    } else {
        Arc::new(NoNews)
    };

    let ports = Ports {
        provider: Arc::new(provider),
        store: store.clone(),
        calendar,
        notifier: Arc::new(LogNotifier),
    };
    let poll = tokio::time::Duration::from_secs(config.poll_seconds.max(1));
    let mut pipeline = SignalPipeline::new(config, ports);

    // ── 3. Polling loop ──────────────────────────────────────────────────
    info!("Pipeline running. Press Ctrl+C to stop.");
    let mut interval = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = tokio::task::block_in_place(|| pipeline.run_cycle(chrono::Utc::now()));
                if report.accepted().next().is_some() || report.outcomes > 0 {
                    if let Err(e) = store.flush() {
                        error!(error = %e, "Failed to flush signal store");
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                break;
            }
        }
    }

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    warn!("Shutdown signal received, stopping gracefully");

    if let Err(e) = store.flush() {
        error!(error = %e, "Failed to flush signal store on shutdown");
    }

    info!("SMC Sentinel shut down complete.");
    Ok(())
}
