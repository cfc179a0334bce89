//! End-to-end tests: the real monitoring loop driven by injected ticks,
//! with in-memory collaborators behind the ports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use trigger_engine::application::services::{EngineHandle, EngineHealth, TriggerMonitor};
use trigger_engine::config::MonitorConfig;
use trigger_engine::feed::{FeedMode, PriceTick, tick_channel};
use trigger_engine::{
    HitKind, InMemoryPositionRepository, PositionChange, PositionId, PositionRecord, PositionSide,
    RecordingNotifier, RecordingTradeUpdate, Symbol, TrailingStopSpec,
};

struct Harness {
    repo: Arc<InMemoryPositionRepository>,
    trade: Arc<RecordingTradeUpdate>,
    notifier: Arc<RecordingNotifier>,
    ticks_tx: mpsc::Sender<PriceTick>,
    symbols_rx: watch::Receiver<Vec<Symbol>>,
    handle: EngineHandle,
    health_rx: watch::Receiver<EngineHealth>,
    shutdown: CancellationToken,
    // Kept alive so the monitor's feed-mode branch stays armed.
    _mode_tx: watch::Sender<FeedMode>,
}

impl Harness {
    async fn start(config: MonitorConfig, records: Vec<PositionRecord>) -> Self {
        let repo = Arc::new(InMemoryPositionRepository::new());
        for record in records {
            repo.upsert(record);
        }

        let trade = Arc::new(RecordingTradeUpdate::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let (ticks_tx, ticks_rx) = tick_channel(64);
        let (symbols_tx, symbols_rx) = watch::channel(Vec::new());
        let (mode_tx, mode_rx) = watch::channel(FeedMode::Streaming);
        let shutdown = CancellationToken::new();

        let (monitor, handle, health_rx) = TriggerMonitor::new(
            config,
            Arc::clone(&repo),
            Arc::clone(&trade),
            Arc::clone(&notifier),
            ticks_rx,
            symbols_tx,
            mode_rx,
            shutdown.clone(),
        );
        tokio::spawn(monitor.run());

        let harness = Self {
            repo,
            trade,
            notifier,
            ticks_tx,
            symbols_rx,
            handle,
            health_rx,
            shutdown,
            _mode_tx: mode_tx,
        };

        // The loop populates the index before consuming ticks.
        harness
            .wait_until(|h| h.health_rx.borrow().last_rebuild_at.is_some(), "initial rebuild")
            .await;

        harness
    }

    async fn tick(&self, symbol: &str, price: Decimal) {
        self.ticks_tx
            .send(PriceTick {
                symbol: Symbol::new(symbol),
                price,
                at: Utc::now(),
            })
            .await
            .expect("engine alive");
    }

    async fn wait_until<F>(&self, predicate: F, what: &str)
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !predicate(self) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Let in-flight dispatches settle before asserting an absence.
    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn quiet_config() -> MonitorConfig {
    MonitorConfig {
        rebuild_interval_secs: 3600,
        near_alert_pct: Decimal::ZERO,
        ..Default::default()
    }
}

fn long_position(id: i64, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> PositionRecord {
    PositionRecord {
        id: PositionId::new(id),
        symbol: Symbol::new("BTCUSDT"),
        side: PositionSide::Long,
        entry: dec!(110),
        stop_loss,
        take_profit,
        trailing_stop: None,
        version: 1,
    }
}

#[tokio::test]
async fn stop_loss_fires_exactly_once() {
    let harness = Harness::start(
        quiet_config(),
        vec![long_position(1, Some(dec!(100)), Some(dec!(120)))],
    )
    .await;

    for price in [dec!(105), dec!(99), dec!(98)] {
        harness.tick("BTCUSDT", price).await;
    }

    harness
        .wait_until(|h| h.trade.len() == 1, "stop-loss report")
        .await;

    let reported = harness.trade.reported();
    assert_eq!(reported[0].kind, HitKind::StopLoss);
    assert_eq!(reported[0].price, dec!(99));
    assert_eq!(reported[0].position_ref, PositionId::new(1));

    // A further breach produces no additional hit event.
    harness.tick("BTCUSDT", dec!(97)).await;
    harness.settle().await;
    assert_eq!(harness.trade.len(), 1);
    assert_eq!(harness.notifier.len(), 1);
}

#[tokio::test]
async fn trailing_stop_ratchets_then_fires() {
    let record = PositionRecord {
        trailing_stop: Some(TrailingStopSpec {
            distance: dec!(5),
            threshold: dec!(95),
        }),
        ..long_position(7, None, None)
    };
    let harness = Harness::start(quiet_config(), vec![record]).await;

    // Favorable ticks move the threshold to 103 without firing.
    harness.tick("BTCUSDT", dec!(102)).await;
    harness.tick("BTCUSDT", dec!(108)).await;
    harness.settle().await;
    assert!(harness.trade.is_empty());

    // Pullback through the ratcheted threshold fires once.
    harness.tick("BTCUSDT", dec!(102)).await;
    harness
        .wait_until(|h| h.trade.len() == 1, "trailing stop report")
        .await;

    let reported = harness.trade.reported();
    assert_eq!(reported[0].kind, HitKind::TrailingStop);
    assert_eq!(reported[0].threshold, dec!(103));
    assert_eq!(reported[0].price, dec!(102));
}

#[tokio::test]
async fn auto_close_disabled_notifies_without_trade_update() {
    let config = MonitorConfig {
        auto_close: false,
        ..quiet_config()
    };
    let harness = Harness::start(config, vec![long_position(1, Some(dec!(100)), None)]).await;

    harness.tick("BTCUSDT", dec!(99)).await;
    harness
        .wait_until(|h| h.notifier.len() == 1, "hit notification")
        .await;

    assert_eq!(harness.notifier.delivered()[0].kind, HitKind::StopLoss);
    harness.settle().await;
    assert!(harness.trade.is_empty());
}

#[tokio::test]
async fn incremental_updates_apply_in_version_order() {
    let harness = Harness::start(quiet_config(), vec![]).await;

    // Versions [1, 3, 2]: the final state must be version 3 (stop at 90).
    for (version, stop) in [(1u64, dec!(100)), (3, dec!(90)), (2, dec!(95))] {
        let mut record = long_position(1, Some(stop), None);
        record.version = version;
        let change = if version == 1 {
            PositionChange::opened(record)
        } else {
            PositionChange::modified(record)
        };
        harness.handle.apply_change(change).await.unwrap();
    }

    harness
        .wait_until(|h| h.health_rx.borrow().active_triggers == 1, "indexed trigger")
        .await;

    // 92 is above the version-3 stop (90) but below the stale ones.
    harness.tick("BTCUSDT", dec!(92)).await;
    harness.settle().await;
    assert!(harness.trade.is_empty());

    harness.tick("BTCUSDT", dec!(89)).await;
    harness
        .wait_until(|h| h.trade.len() == 1, "version-3 stop report")
        .await;
    assert_eq!(harness.trade.reported()[0].threshold, dec!(90));
}

#[tokio::test]
async fn closed_position_stops_matching() {
    let harness =
        Harness::start(quiet_config(), vec![long_position(1, Some(dec!(100)), None)]).await;

    harness
        .wait_until(|h| !h.symbols_rx.borrow().is_empty(), "watched instrument")
        .await;

    harness
        .handle
        .apply_change(PositionChange::closed(PositionId::new(1), 2))
        .await
        .unwrap();
    harness
        .wait_until(|h| h.symbols_rx.borrow().is_empty(), "instrument set drained")
        .await;

    harness.tick("BTCUSDT", dec!(50)).await;
    harness.settle().await;
    assert!(harness.trade.is_empty());
}

#[tokio::test]
async fn fired_marker_survives_rebuild_while_close_in_flight() {
    let config = MonitorConfig {
        rebuild_interval_secs: 1,
        near_alert_pct: Decimal::ZERO,
        ..Default::default()
    };
    let harness = Harness::start(config, vec![long_position(1, Some(dec!(100)), None)]).await;

    harness.tick("BTCUSDT", dec!(99)).await;
    harness
        .wait_until(|h| h.trade.len() == 1, "stop-loss report")
        .await;

    // The position is still open in the store (its close is in flight), so
    // the next rebuild re-adds the trigger. The fired marker must gate it.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    harness.tick("BTCUSDT", dec!(98)).await;
    harness.settle().await;
    assert_eq!(harness.trade.len(), 1);

    // Once the close lands in the store, the rebuild drops the trigger and
    // the marker with it.
    harness.repo.remove(PositionId::new(1));
    harness
        .wait_until(|h| h.health_rx.borrow().active_triggers == 0, "trigger retired")
        .await;
}

#[tokio::test]
async fn rebuild_failure_keeps_stale_index_live() {
    let config = MonitorConfig {
        rebuild_interval_secs: 1,
        near_alert_pct: Decimal::ZERO,
        ..Default::default()
    };
    let harness = Harness::start(config, vec![long_position(1, Some(dec!(100)), None)]).await;

    // Every upcoming rebuild fails; the previous index must stay live.
    harness.repo.fail_next(u32::MAX);
    harness
        .wait_until(
            |h| h.health_rx.borrow().consecutive_rebuild_failures >= 1,
            "failed rebuild cycle",
        )
        .await;
    assert!(!harness.health_rx.borrow().rebuild_ok);

    harness.tick("BTCUSDT", dec!(99)).await;
    harness
        .wait_until(|h| h.trade.len() == 1, "hit against stale index")
        .await;
}

#[tokio::test]
async fn near_touch_alert_fires_once_then_real_hit() {
    let config = MonitorConfig {
        near_alert_pct: dec!(1.5),
        ..quiet_config()
    };
    let harness = Harness::start(config, vec![long_position(1, Some(dec!(100)), None)]).await;

    // Two ticks inside the warning band produce one advisory.
    harness.tick("BTCUSDT", dec!(101)).await;
    harness.tick("BTCUSDT", dec!(100.5)).await;
    harness
        .wait_until(|h| h.notifier.len() == 1, "near-touch advisory")
        .await;
    assert_eq!(
        harness.notifier.delivered()[0].kind,
        HitKind::NearStopLoss
    );
    harness.settle().await;
    assert!(harness.trade.is_empty());

    // The real breach still fires and closes.
    harness.tick("BTCUSDT", dec!(99)).await;
    harness
        .wait_until(|h| h.trade.len() == 1, "stop-loss report")
        .await;
    assert_eq!(harness.notifier.len(), 2);
}
