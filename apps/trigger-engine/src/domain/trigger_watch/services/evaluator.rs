//! Tick evaluation against the trigger index.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{PositionId, Symbol};
use crate::domain::trigger_watch::value_objects::{HitKind, TriggerHit, TriggerId, TriggerTag};

use super::index::TriggerIndex;

/// Which event wins when one tick satisfies both the stop and the target of
/// the same position (possible with gapped prices or overlapping levels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameTickPriority {
    /// The stop side wins (pessimistic assumption).
    #[default]
    StopFirst,
    /// The target side wins (optimistic assumption).
    TargetFirst,
}

/// Evaluator policy knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Same-tick stop/target collision rule.
    pub same_tick_priority: SameTickPriority,
    /// Near-touch warning band as a fraction of the level (e.g. `0.015` for
    /// 1.5%). `None` disables near-touch alerts.
    pub near_alert_pct: Option<Decimal>,
}

/// Consumes ticks, queries the index, and decides which triggers fired.
///
/// The evaluator holds no trigger state of its own; trailing-stop thresholds
/// are adjusted through the index's ratchet path before hits are collected,
/// so a hit always reflects the post-ratchet threshold.
#[derive(Debug, Clone, Default)]
pub struct TriggerEvaluator {
    config: EvaluatorConfig,
}

impl TriggerEvaluator {
    /// Create an evaluator with the given policy.
    #[must_use]
    pub const fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one tick.
    ///
    /// Returns satisfied triggers as hit events in index iteration order,
    /// followed by any near-touch advisories. The caller is responsible for
    /// deduplication.
    pub fn evaluate(
        &self,
        index: &mut TriggerIndex,
        symbol: &Symbol,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Vec<TriggerHit> {
        Self::apply_ratchets(index, symbol, price);

        let mut hits: Vec<TriggerHit> = index
            .lookup(symbol, price)
            .into_iter()
            .map(|trigger| TriggerHit::from_trigger(trigger, price, at))
            .collect();

        self.resolve_collisions(&mut hits);

        if let Some(pct) = self.config.near_alert_pct {
            hits.extend(Self::near_alerts(index, symbol, price, at, pct));
        }

        hits
    }

    /// Move trailing stops whose distance the tick has outrun.
    ///
    /// Runs before hit collection so a hit is always checked against the
    /// current (possibly just-moved) threshold.
    fn apply_ratchets(index: &mut TriggerIndex, symbol: &Symbol, price: Decimal) {
        let ratchets: Vec<(TriggerId, Decimal)> = index
            .triggers_for(symbol)
            .filter_map(|t| t.ratchet_candidate(price).map(|c| (t.id, c)))
            .collect();

        for (id, new_threshold) in ratchets {
            match index.ratchet(id, new_threshold) {
                Ok(true) => {
                    tracing::debug!(
                        trigger_id = %id,
                        threshold = %new_threshold,
                        "trailing stop ratcheted"
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(trigger_id = %id, error = %e, "ratchet failed");
                }
            }
        }
    }

    /// Drop the losing side when one tick satisfies both stop and target of
    /// the same position.
    fn resolve_collisions(&self, hits: &mut Vec<TriggerHit>) {
        let stop_positions: HashSet<PositionId> = hits
            .iter()
            .filter(|h| Self::is_stop_side(h.kind))
            .map(|h| h.position_ref)
            .collect();
        let target_positions: HashSet<PositionId> = hits
            .iter()
            .filter(|h| h.kind == HitKind::TakeProfit)
            .map(|h| h.position_ref)
            .collect();

        let collided: HashSet<PositionId> = stop_positions
            .intersection(&target_positions)
            .copied()
            .collect();
        if collided.is_empty() {
            return;
        }

        for position in &collided {
            tracing::warn!(
                position = %position,
                priority = ?self.config.same_tick_priority,
                "stop and target satisfied by the same tick"
            );
        }

        match self.config.same_tick_priority {
            SameTickPriority::StopFirst => {
                hits.retain(|h| {
                    h.kind != HitKind::TakeProfit || !collided.contains(&h.position_ref)
                });
            }
            SameTickPriority::TargetFirst => {
                hits.retain(|h| {
                    !Self::is_stop_side(h.kind) || !collided.contains(&h.position_ref)
                });
            }
        }
    }

    const fn is_stop_side(kind: HitKind) -> bool {
        matches!(kind, HitKind::StopLoss | HitKind::TrailingStop)
    }

    /// Near-touch advisories for fixed levels the tick is approaching.
    fn near_alerts(
        index: &TriggerIndex,
        symbol: &Symbol,
        price: Decimal,
        at: DateTime<Utc>,
        pct: Decimal,
    ) -> Vec<TriggerHit> {
        index
            .triggers_for(symbol)
            .filter_map(|trigger| {
                let near_kind = match trigger.id.tag() {
                    TriggerTag::StopLoss => HitKind::NearStopLoss,
                    TriggerTag::TakeProfit => HitKind::NearTakeProfit,
                    // A trailing threshold moves with price; warning about it
                    // would fire on every pullback.
                    TriggerTag::TrailingStop => return None,
                };

                if trigger.is_hit(price) {
                    return None;
                }

                let threshold = trigger.threshold;
                let within_band = if trigger.fires_on_fall() {
                    price <= threshold * (Decimal::ONE + pct)
                } else {
                    price >= threshold * (Decimal::ONE - pct)
                };

                within_band.then(|| TriggerHit::near(trigger, near_kind, price, at))
            })
            .collect()
    }
}
