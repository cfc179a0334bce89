//! Position records and change events as seen by the engine.
//!
//! These are the engine-facing shapes of the persistence collaborator's data:
//! a snapshot record per open position with its configured exit levels, and
//! an incremental change event pushed when a position opens, closes, or is
//! modified.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trigger::{PositionSide, Trigger, TriggerId, TriggerKind};
use crate::domain::shared::{PositionId, Symbol};

/// Trailing-stop configuration on a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingStopSpec {
    /// Distance the threshold trails behind the best observed price.
    pub distance: Decimal,
    /// Current threshold. On a fresh position this is the initial level; the
    /// engine ratchets it in memory as favorable ticks arrive.
    pub threshold: Decimal,
}

/// One open position with its configured triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Position identifier.
    pub id: PositionId,
    /// Instrument the position is in.
    pub symbol: Symbol,
    /// Long or short.
    pub side: PositionSide,
    /// Entry price, kept for notification context.
    pub entry: Decimal,
    /// Configured stop-loss level, if any.
    pub stop_loss: Option<Decimal>,
    /// Configured take-profit level, if any.
    pub take_profit: Option<Decimal>,
    /// Configured trailing stop, if any.
    pub trailing_stop: Option<TrailingStopSpec>,
    /// Monotonically increasing record version from persistence.
    pub version: u64,
}

impl PositionRecord {
    /// Project this record into its active triggers.
    ///
    /// A position contributes one trigger per configured kind; a position
    /// with no configured levels contributes none and is never indexed.
    #[must_use]
    pub fn project_triggers(&self) -> Vec<Trigger> {
        let mut triggers = Vec::with_capacity(3);

        if let Some(level) = self.stop_loss {
            triggers.push(self.trigger(TriggerKind::StopLoss, level));
        }
        if let Some(level) = self.take_profit {
            triggers.push(self.trigger(TriggerKind::TakeProfit, level));
        }
        if let Some(spec) = self.trailing_stop {
            triggers.push(self.trigger(
                TriggerKind::TrailingStop {
                    distance: spec.distance,
                },
                spec.threshold,
            ));
        }

        triggers
    }

    fn trigger(&self, kind: TriggerKind, threshold: Decimal) -> Trigger {
        Trigger {
            id: TriggerId::derive(self.id, kind.tag()),
            symbol: self.symbol.clone(),
            side: self.side,
            kind,
            threshold,
            version: self.version,
        }
    }
}

/// What happened to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A new position opened.
    Opened,
    /// An existing position's levels changed.
    Modified,
    /// The position closed; all its triggers go away.
    Closed,
}

/// Incremental position change pushed into the engine's input queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    /// Which position changed.
    pub position_id: PositionId,
    /// What kind of change.
    pub kind: ChangeKind,
    /// The new record for `Opened` / `Modified`; `None` for `Closed`.
    pub record: Option<PositionRecord>,
    /// Version of the change, for stale-update detection.
    pub version: u64,
}

impl PositionChange {
    /// Change event for a newly opened position.
    #[must_use]
    pub fn opened(record: PositionRecord) -> Self {
        Self {
            position_id: record.id,
            version: record.version,
            kind: ChangeKind::Opened,
            record: Some(record),
        }
    }

    /// Change event for a modified position.
    #[must_use]
    pub fn modified(record: PositionRecord) -> Self {
        Self {
            position_id: record.id,
            version: record.version,
            kind: ChangeKind::Modified,
            record: Some(record),
        }
    }

    /// Change event for a closed position.
    #[must_use]
    pub const fn closed(position_id: PositionId, version: u64) -> Self {
        Self {
            position_id,
            kind: ChangeKind::Closed,
            record: None,
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trigger_watch::value_objects::TriggerTag;
    use rust_decimal_macros::dec;

    fn record() -> PositionRecord {
        PositionRecord {
            id: PositionId::new(7),
            symbol: Symbol::new("BTCUSDT"),
            side: PositionSide::Long,
            entry: dec!(110),
            stop_loss: Some(dec!(100)),
            take_profit: Some(dec!(120)),
            trailing_stop: None,
            version: 3,
        }
    }

    #[test]
    fn projects_one_trigger_per_configured_kind() {
        let triggers = record().project_triggers();
        assert_eq!(triggers.len(), 2);

        let tags: Vec<_> = triggers.iter().map(|t| t.id.tag()).collect();
        assert_eq!(tags, vec![TriggerTag::StopLoss, TriggerTag::TakeProfit]);
        assert!(triggers.iter().all(|t| t.version == 3));
    }

    #[test]
    fn projects_trailing_stop_with_initial_threshold() {
        let mut rec = record();
        rec.stop_loss = None;
        rec.take_profit = None;
        rec.trailing_stop = Some(TrailingStopSpec {
            distance: dec!(5),
            threshold: dec!(95),
        });

        let triggers = rec.project_triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].threshold, dec!(95));
        assert_eq!(
            triggers[0].kind,
            TriggerKind::TrailingStop { distance: dec!(5) }
        );
    }

    #[test]
    fn bare_position_projects_nothing() {
        let mut rec = record();
        rec.stop_loss = None;
        rec.take_profit = None;
        assert!(rec.project_triggers().is_empty());
    }

    #[test]
    fn closed_change_carries_no_record() {
        let change = PositionChange::closed(PositionId::new(7), 4);
        assert_eq!(change.kind, ChangeKind::Closed);
        assert!(change.record.is_none());
        assert_eq!(change.version, 4);
    }
}
