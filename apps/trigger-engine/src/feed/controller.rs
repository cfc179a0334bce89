//! Feed controller: owns delivery-mode state and produces the tick stream.
//!
//! Streaming is the preferred mode. When the stream cannot be established
//! within the configured bound, or its reconnect budget runs out, the
//! controller degrades to periodic REST polling for the same instrument set
//! and keeps retrying the stream in the background. Consumers read one tick
//! channel and never observe the switch.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::BinanceFeedConfig;
use crate::domain::shared::Symbol;
use crate::observability::metrics::record_feed_mode;

use super::stream::SessionEnd;
use super::{FeedError, FeedMode, PollingClient, PriceTick, ReconnectPolicy, stream};

/// Consecutive poll failures before the feed reports itself unavailable.
const POLL_FAILURES_BEFORE_UNAVAILABLE: u32 = 3;

/// Why a delivery phase ended.
enum PhaseExit {
    /// Shutdown requested or the engine side of a channel is gone.
    Shutdown,
    /// The instrument set became empty; go back to waiting.
    Idle,
    /// Streaming is not viable; fall back to polling.
    Degrade,
    /// The polling phase's retry window elapsed; try streaming again.
    RetryStreaming,
}

/// Drives the price feed and switches delivery modes.
pub struct FeedController {
    config: BinanceFeedConfig,
    symbols_rx: watch::Receiver<Vec<Symbol>>,
    ticks_tx: mpsc::Sender<PriceTick>,
    mode_tx: watch::Sender<FeedMode>,
    shutdown: CancellationToken,
}

impl FeedController {
    /// Create a controller.
    ///
    /// Returns the controller and a receiver for delivery-mode changes, used
    /// by the health surface.
    #[must_use]
    pub fn new(
        config: BinanceFeedConfig,
        symbols_rx: watch::Receiver<Vec<Symbol>>,
        ticks_tx: mpsc::Sender<PriceTick>,
        shutdown: CancellationToken,
    ) -> (Self, watch::Receiver<FeedMode>) {
        let (mode_tx, mode_rx) = watch::channel(FeedMode::Streaming);

        (
            Self {
                config,
                symbols_rx,
                ticks_tx,
                mode_tx,
                shutdown,
            },
            mode_rx,
        )
    }

    /// Spawn the controller onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            // Nothing to watch: park until the instrument set changes.
            let symbols = self.symbols_rx.borrow_and_update().clone();
            if symbols.is_empty() {
                tokio::select! {
                    changed = self.symbols_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = self.shutdown.cancelled() => break,
                }
                continue;
            }

            match self.streaming_phase().await {
                PhaseExit::Shutdown => break,
                PhaseExit::Idle | PhaseExit::RetryStreaming => {}
                PhaseExit::Degrade => {
                    if matches!(self.polling_phase().await, PhaseExit::Shutdown) {
                        break;
                    }
                }
            }
        }

        tracing::info!("price feed stopped");
    }

    /// Try to establish and hold the streaming subscription.
    async fn streaming_phase(&mut self) -> PhaseExit {
        let mut policy = ReconnectPolicy::new(&self.config);
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);

        loop {
            let symbols = self.symbols_rx.borrow_and_update().clone();
            if symbols.is_empty() {
                return PhaseExit::Idle;
            }

            let connected =
                match timeout(connect_timeout, stream::connect(&self.config.ws_url, &symbols))
                    .await
                {
                    Ok(Ok(ws)) => Some(ws),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "stream connect failed");
                        None
                    }
                    Err(_) => {
                        let e = FeedError::EstablishTimeout {
                            timeout_ms: u64::try_from(connect_timeout.as_millis())
                                .unwrap_or(u64::MAX),
                        };
                        tracing::warn!(error = %e, "stream establishment timed out");
                        None
                    }
                };

            if let Some(ws) = connected {
                self.set_mode(FeedMode::Streaming);
                policy.reset();

                match stream::run_session(
                    ws,
                    &mut self.symbols_rx,
                    &self.ticks_tx,
                    &self.shutdown,
                )
                .await
                {
                    Ok(SessionEnd::Shutdown | SessionEnd::SymbolSourceClosed)
                    | Err(FeedError::ChannelClosed) => return PhaseExit::Shutdown,
                    Err(e) => {
                        tracing::warn!(error = %e, "stream session ended");
                    }
                }
            }

            match policy.next_backoff() {
                Some(backoff) => {
                    tracing::info!(
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        attempt = policy.attempt(),
                        "reconnecting stream"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(backoff) => {}
                        () = self.shutdown.cancelled() => return PhaseExit::Shutdown,
                    }
                }
                None => {
                    tracing::error!(
                        attempts = policy.attempt(),
                        "stream reconnect attempts exhausted, degrading to polling"
                    );
                    return PhaseExit::Degrade;
                }
            }
        }
    }

    /// Poll prices on a fixed cadence until the streaming retry window
    /// elapses.
    async fn polling_phase(&mut self) -> PhaseExit {
        self.set_mode(FeedMode::Polling);

        let client = match PollingClient::new(
            self.config.rest_url.clone(),
            Duration::from_secs(self.config.request_timeout_secs),
        ) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "polling client could not be built");
                self.set_mode(FeedMode::Unavailable);
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(self.config.streaming_retry_secs)) => {
                        return PhaseExit::RetryStreaming;
                    }
                    () = self.shutdown.cancelled() => return PhaseExit::Shutdown,
                }
            }
        };

        let mut poll = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let retry_stream = tokio::time::sleep(Duration::from_secs(self.config.streaming_retry_secs));
        tokio::pin!(retry_stream);

        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    let symbols = self.symbols_rx.borrow_and_update().clone();
                    if symbols.is_empty() {
                        return PhaseExit::Idle;
                    }

                    match client.fetch_ticks(&symbols).await {
                        Ok(ticks) => {
                            consecutive_failures = 0;
                            self.set_mode(FeedMode::Polling);
                            for tick in ticks {
                                if self.ticks_tx.send(tick).await.is_err() {
                                    return PhaseExit::Shutdown;
                                }
                            }
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            tracing::warn!(
                                error = %e,
                                consecutive = consecutive_failures,
                                "price poll failed"
                            );
                            if consecutive_failures >= POLL_FAILURES_BEFORE_UNAVAILABLE {
                                // Both delivery modes are down: no ticks flow
                                // and evaluation pauses on the stale index.
                                self.set_mode(FeedMode::Unavailable);
                            }
                        }
                    }
                }
                () = &mut retry_stream => {
                    tracing::info!("streaming retry window elapsed");
                    return PhaseExit::RetryStreaming;
                }
                () = self.shutdown.cancelled() => return PhaseExit::Shutdown,
            }
        }
    }

    fn set_mode(&self, mode: FeedMode) {
        let changed = self.mode_tx.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });

        if changed {
            tracing::info!(mode = %mode, "feed delivery mode changed");
            record_feed_mode(mode);
        }
    }
}
