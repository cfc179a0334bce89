//! Trigger Engine Binary
//!
//! Starts the price-trigger monitoring engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trigger-engine
//! ```
//!
//! # Environment Variables
//!
//! - `TRIGGER_ENGINE_CONFIG`: Config file path (default: config.yaml)
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: referenced by the default
//!   config for Telegram delivery
//! - `RUST_LOG`: Log level filter (default: from config)

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use trigger_engine::application::services::TriggerMonitor;
use trigger_engine::config::{Config, load_config};
use trigger_engine::feed::{FeedController, tick_channel};
use trigger_engine::infrastructure::http;
use trigger_engine::infrastructure::notify::{LogNotifier, TelegramNotifier};
use trigger_engine::infrastructure::persistence::InMemoryPositionRepository;
use trigger_engine::infrastructure::trade::LogTradeUpdate;
use trigger_engine::application::ports::NotifierPort;
use trigger_engine::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    let config = load()?;

    let tracing_guard =
        init_tracing(&config.observability).context("tracing initialization failed")?;
    init_metrics(&config.observability).context("metrics initialization failed")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting trigger engine");

    let shutdown = CancellationToken::new();

    // Collaborator adapters. The in-memory repository is the default wiring;
    // deployments embedding the engine supply their own store adapter and
    // push position changes through the engine handle.
    let repo = Arc::new(InMemoryPositionRepository::new());
    let trade_update = Arc::new(LogTradeUpdate::new());
    let notifier = build_notifier(&config)?;

    // Channels between the feed and the loop.
    let (ticks_tx, ticks_rx) = tick_channel(config.monitor.tick_queue_capacity);
    let (symbols_tx, symbols_rx) = tokio::sync::watch::channel(Vec::new());

    let (feed, feed_mode_rx) = FeedController::new(
        config.feeds.binance.clone(),
        symbols_rx,
        ticks_tx,
        shutdown.clone(),
    );
    let feed_handle = feed.spawn();

    let (monitor, engine_handle, health_rx) = TriggerMonitor::new(
        config.monitor.clone(),
        repo,
        trade_update,
        notifier,
        ticks_rx,
        symbols_tx,
        feed_mode_rx,
        shutdown.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run());

    // Keep the handle alive for the process lifetime; embedders clone it
    // into their API layer.
    let _engine_handle = engine_handle;

    let health_listener = http::bind(&config.server.health_addr)
        .await
        .context("health endpoint bind failed")?;
    let health_handle = tokio::spawn(http::serve(
        health_listener,
        health_rx,
        shutdown.clone(),
    ));

    tracing::info!("trigger engine ready");

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();

    let _ = monitor_handle.await;
    let _ = feed_handle.await;
    if let Ok(Err(e)) = health_handle.await {
        tracing::warn!(error = %e, "health endpoint exited with error");
    }

    if let Some(guard) = tracing_guard {
        guard.shutdown();
    }

    tracing::info!("trigger engine stopped");
    Ok(())
}

/// Load configuration from the configured path, falling back to defaults
/// when no file exists.
fn load() -> anyhow::Result<Config> {
    let path = std::env::var("TRIGGER_ENGINE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

    match load_config(Some(&path)) {
        Ok(config) => Ok(config),
        Err(trigger_engine::config::ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            eprintln!("config file '{path}' not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading config from '{path}'")),
    }
}

/// Choose the notifier adapter from configuration.
fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn NotifierPort>> {
    match &config.notify.telegram {
        Some(telegram) if !telegram.bot_token.is_empty() => {
            let notifier = TelegramNotifier::new(telegram.clone())
                .context("telegram notifier initialization failed")?;
            tracing::info!("telegram notifier configured");
            Ok(Arc::new(notifier))
        }
        _ => Ok(Arc::new(LogNotifier::new())),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
