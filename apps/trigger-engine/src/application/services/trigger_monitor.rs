//! The monitoring loop: single owner of all engine state.
//!
//! One task exclusively owns the trigger index and the fired-marker set and
//! consumes a single merged queue of inputs: price ticks, position-change
//! handoffs from other execution contexts, and the rebuild timer. Nothing
//! else ever touches the mutable state, which makes the atomic-swap and
//! exactly-once guarantees local facts of this loop instead of cross-task
//! protocols. Other contexts interact through [`EngineHandle`] messages.
//!
//! Downstream reporting is dispatched to short-lived worker tasks with a
//! bounded timeout, so a slow trade-update or notification collaborator can
//! never stall tick processing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{NotifierPort, PositionRepositoryPort, TradeUpdatePort};
use crate::config::MonitorConfig;
use crate::domain::shared::Symbol;
use crate::domain::trigger_watch::{
    FiredMarkers, PositionChange, TriggerEvaluator, TriggerHit, TriggerIndex,
};
use crate::feed::{FeedMode, PriceTick};
use crate::observability::metrics::{
    record_duplicate_suppressed, record_hit_report, record_index_size, record_tick_processed,
    record_trigger_fired,
};

use super::health::EngineHealth;
use super::rebuild::{RebuildOutcome, RebuildScheduler, apply_incremental};

/// Messages other execution contexts hand off to the loop.
#[derive(Debug)]
pub enum EngineCommand {
    /// Apply an incremental position change.
    ApplyChange(PositionChange),
}

/// Handoff failure.
#[derive(Debug, Clone, Error)]
pub enum HandoffError {
    /// The monitoring loop has stopped and no longer accepts commands.
    #[error("engine stopped")]
    EngineStopped,
}

/// Cloneable handle for pushing work into the loop from other contexts.
///
/// This is the only way into the engine's mutable state: the API layer and
/// the chat layer call [`EngineHandle::apply_change`] instead of mutating the
/// index themselves.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Enqueue a position change for the loop to apply.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::EngineStopped`] when the loop is gone.
    pub async fn apply_change(&self, change: PositionChange) -> Result<(), HandoffError> {
        self.commands
            .send(EngineCommand::ApplyChange(change))
            .await
            .map_err(|_| HandoffError::EngineStopped)
    }
}

/// The monitoring loop.
pub struct TriggerMonitor<R, T: ?Sized, N: ?Sized> {
    config: MonitorConfig,
    index: TriggerIndex,
    markers: FiredMarkers,
    evaluator: TriggerEvaluator,
    rebuild: RebuildScheduler<R>,
    trade_update: Arc<T>,
    notifier: Arc<N>,
    ticks_rx: mpsc::Receiver<PriceTick>,
    commands_rx: mpsc::Receiver<EngineCommand>,
    symbols_tx: watch::Sender<Vec<Symbol>>,
    feed_mode_rx: watch::Receiver<FeedMode>,
    feed_mode_alive: bool,
    health_tx: watch::Sender<EngineHealth>,
    last_tick_at: Option<chrono::DateTime<Utc>>,
    shutdown: CancellationToken,
}

impl<R, T, N> TriggerMonitor<R, T, N>
where
    R: PositionRepositoryPort + 'static,
    T: TradeUpdatePort + ?Sized + 'static,
    N: NotifierPort + ?Sized + 'static,
{
    /// Wire up the loop.
    ///
    /// Returns the monitor (to be run on its own task), the command handle
    /// for other contexts, and the health snapshot receiver.
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        repo: Arc<R>,
        trade_update: Arc<T>,
        notifier: Arc<N>,
        ticks_rx: mpsc::Receiver<PriceTick>,
        symbols_tx: watch::Sender<Vec<Symbol>>,
        feed_mode_rx: watch::Receiver<FeedMode>,
        shutdown: CancellationToken,
    ) -> (Self, EngineHandle, watch::Receiver<EngineHealth>) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue_capacity);
        let (health_tx, health_rx) =
            watch::channel(EngineHealth::starting(*feed_mode_rx.borrow()));

        let evaluator = TriggerEvaluator::new(config.to_evaluator_config());
        let rebuild = RebuildScheduler::new(
            repo,
            Duration::from_secs(config.rebuild_timeout_secs),
            config.rebuild_escalation_threshold,
        );

        let monitor = Self {
            config,
            index: TriggerIndex::new(),
            markers: FiredMarkers::new(),
            evaluator,
            rebuild,
            trade_update,
            notifier,
            ticks_rx,
            commands_rx,
            symbols_tx,
            feed_mode_rx,
            feed_mode_alive: true,
            health_tx,
            last_tick_at: None,
            shutdown,
        };

        (monitor, EngineHandle { commands: commands_tx }, health_rx)
    }

    /// Run the loop until shutdown.
    ///
    /// Populates the index immediately, then serializes all state mutation
    /// through one `select!` over the merged input queue.
    pub async fn run(mut self) {
        tracing::info!("trigger monitor starting");

        self.rebuild_now().await;

        let rebuild_period = Duration::from_secs(self.config.rebuild_interval_secs);
        let mut rebuild_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + rebuild_period, rebuild_period);
        rebuild_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(tick) = self.ticks_rx.recv() => {
                    self.handle_tick(&tick);
                }
                Some(command) = self.commands_rx.recv() => {
                    self.handle_command(command);
                }
                _ = rebuild_timer.tick() => {
                    self.rebuild_now().await;
                }
                changed = self.feed_mode_rx.changed(), if self.feed_mode_alive => {
                    if changed.is_err() {
                        self.feed_mode_alive = false;
                    }
                    self.publish_health();
                }
                () = self.shutdown.cancelled() => break,
            }
        }

        tracing::info!("trigger monitor stopped");
    }

    /// Evaluate one tick and report fresh hits.
    fn handle_tick(&mut self, tick: &PriceTick) {
        record_tick_processed();
        self.last_tick_at = Some(tick.at);

        let hits = self
            .evaluator
            .evaluate(&mut self.index, &tick.symbol, tick.price, tick.at);

        for hit in hits {
            let marker = hit.marker();
            if !self.markers.should_report(marker) {
                record_duplicate_suppressed();
                continue;
            }
            self.markers.mark_reported(marker);
            record_trigger_fired(hit.kind.as_str());

            if hit.kind.closes_position() {
                tracing::warn!(
                    position = %hit.position_ref,
                    symbol = %hit.symbol,
                    kind = %hit.kind,
                    threshold = %hit.threshold,
                    price = %hit.price,
                    "trigger hit"
                );
            } else {
                tracing::info!(
                    position = %hit.position_ref,
                    symbol = %hit.symbol,
                    kind = %hit.kind,
                    threshold = %hit.threshold,
                    price = %hit.price,
                    "price approaching level"
                );
            }

            self.dispatch_report(hit);
        }

        self.publish_health();
    }

    /// Apply a handed-off position change.
    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::ApplyChange(change) => {
                apply_incremental(&mut self.index, &mut self.markers, change);
                self.sync_symbols();
                self.publish_health();
            }
        }
    }

    /// Run a full rebuild cycle and swap the snapshot in on success.
    async fn rebuild_now(&mut self) {
        match self.rebuild.full_rebuild().await {
            RebuildOutcome::Rebuilt(snapshot) => {
                // Single visible swap: this loop's state holds either the old
                // snapshot or the new one, never a mix.
                self.index.replace(snapshot);
                self.markers.retain_known(&self.index);
                self.sync_symbols();
            }
            RebuildOutcome::Failed { .. } => {
                // Fail-open: the stale index stays live and evaluation
                // continues; the scheduler already logged and escalated.
            }
        }

        self.publish_health();
    }

    /// Hand a hit to the downstream collaborators on a worker task.
    ///
    /// The loop never awaits these calls. Each is bounded by the configured
    /// timeout; failures are logged and never cause a re-fire, so a flaky
    /// collaborator cannot produce duplicate position closures.
    fn dispatch_report(&self, hit: TriggerHit) {
        let trade_update = Arc::clone(&self.trade_update);
        let notifier = Arc::clone(&self.notifier);
        let auto_close = self.config.auto_close;
        let report_timeout = Duration::from_secs(self.config.report_timeout_secs);

        tokio::spawn(async move {
            if hit.kind.closes_position() && auto_close {
                let started = Instant::now();
                match tokio::time::timeout(report_timeout, trade_update.report_trigger_hit(&hit))
                    .await
                {
                    Ok(Ok(())) => {
                        record_hit_report("trade_update", "ok", started.elapsed().as_secs_f64());
                    }
                    Ok(Err(e)) => {
                        record_hit_report("trade_update", "error", started.elapsed().as_secs_f64());
                        tracing::error!(
                            position = %hit.position_ref,
                            error = %e,
                            "trade update report failed; not re-firing"
                        );
                    }
                    Err(_) => {
                        record_hit_report(
                            "trade_update",
                            "timeout",
                            started.elapsed().as_secs_f64(),
                        );
                        tracing::error!(
                            position = %hit.position_ref,
                            timeout_secs = report_timeout.as_secs(),
                            "trade update report timed out; not re-firing"
                        );
                    }
                }
            }

            let started = Instant::now();
            match tokio::time::timeout(report_timeout, notifier.notify_hit(&hit)).await {
                Ok(Ok(())) => {
                    record_hit_report("notifier", "ok", started.elapsed().as_secs_f64());
                }
                Ok(Err(e)) => {
                    record_hit_report("notifier", "error", started.elapsed().as_secs_f64());
                    tracing::warn!(
                        position = %hit.position_ref,
                        error = %e,
                        "hit notification failed"
                    );
                }
                Err(_) => {
                    record_hit_report("notifier", "timeout", started.elapsed().as_secs_f64());
                    tracing::warn!(
                        position = %hit.position_ref,
                        "hit notification timed out"
                    );
                }
            }
        });
    }

    /// Publish the watched instrument set to the feed when it changes.
    fn sync_symbols(&self) {
        let symbols = self.index.symbols();
        record_index_size(self.index.len(), symbols.len());

        self.symbols_tx.send_if_modified(|current| {
            if *current == symbols {
                false
            } else {
                tracing::info!(count = symbols.len(), "watched instrument set changed");
                *current = symbols.clone();
                true
            }
        });
    }

    fn publish_health(&self) {
        let health = EngineHealth {
            last_rebuild_at: self.rebuild.last_success_at(),
            rebuild_ok: self.rebuild.consecutive_failures() == 0,
            consecutive_rebuild_failures: self.rebuild.consecutive_failures(),
            feed_mode: *self.feed_mode_rx.borrow(),
            last_tick_at: self.last_tick_at,
            active_triggers: self.index.len(),
            watched_symbols: self.index.symbol_count(),
        };

        self.health_tx.send_replace(health);
    }
}
