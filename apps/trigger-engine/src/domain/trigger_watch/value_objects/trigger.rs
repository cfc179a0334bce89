//! Trigger value objects.
//!
//! A [`Trigger`] is a read-mostly projection of one configured exit level on
//! an open position. Its identity is derived from the owning position and the
//! trigger kind, so it stays stable across full index rebuilds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{PositionId, Symbol};

/// Side of the owning position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    /// Long position: profits when price rises.
    Long,
    /// Short position: profits when price falls.
    Short,
}

/// Discriminant of a trigger kind, without kind-specific payload.
///
/// Used in trigger identity so that `{position}:{tag}` is stable even when a
/// trailing distance changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTag {
    /// Stop-loss level.
    StopLoss,
    /// Take-profit level.
    TakeProfit,
    /// Trailing stop level.
    TrailingStop,
}

impl TriggerTag {
    /// Short tag used in derived identifiers and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "sl",
            Self::TakeProfit => "tp",
            Self::TrailingStop => "ts",
        }
    }
}

impl fmt::Display for TriggerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable trigger identity: owning position plus trigger kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId {
    position: PositionId,
    tag: TriggerTag,
}

impl TriggerId {
    /// Derive the id for a position's trigger of the given kind.
    #[must_use]
    pub const fn derive(position: PositionId, tag: TriggerTag) -> Self {
        Self { position, tag }
    }

    /// The owning position.
    #[must_use]
    pub const fn position(&self) -> PositionId {
        self.position
    }

    /// The trigger kind discriminant.
    #[must_use]
    pub const fn tag(&self) -> TriggerTag {
        self.tag
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.position, self.tag)
    }
}

/// Trigger kind with kind-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fixed stop-loss.
    StopLoss,
    /// Fixed take-profit.
    TakeProfit,
    /// Trailing stop that follows price at a fixed distance.
    TrailingStop {
        /// Absolute distance the threshold trails behind the best price.
        distance: Decimal,
    },
}

impl TriggerKind {
    /// Discriminant for identity derivation.
    #[must_use]
    pub const fn tag(&self) -> TriggerTag {
        match self {
            Self::StopLoss => TriggerTag::StopLoss,
            Self::TakeProfit => TriggerTag::TakeProfit,
            Self::TrailingStop { .. } => TriggerTag::TrailingStop,
        }
    }
}

/// A price condition attached to an open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Stable identity, derived from position + kind.
    pub id: TriggerId,
    /// Instrument this trigger watches.
    pub symbol: Symbol,
    /// Side of the owning position.
    pub side: PositionSide,
    /// Kind and kind-specific parameters.
    pub kind: TriggerKind,
    /// Current threshold price. Immutable except for trailing stops, which
    /// only ever move in the position's favor.
    pub threshold: Decimal,
    /// Version of the owning position record, for stale-update detection.
    pub version: u64,
}

impl Trigger {
    /// Whether this trigger fires when price falls to or through its
    /// threshold (as opposed to rising to or through it).
    ///
    /// Long stop-loss and trailing stop guard the downside; a long
    /// take-profit waits above. Short positions invert all three.
    #[must_use]
    pub const fn fires_on_fall(&self) -> bool {
        match (self.side, self.kind.tag()) {
            (PositionSide::Long, TriggerTag::StopLoss | TriggerTag::TrailingStop)
            | (PositionSide::Short, TriggerTag::TakeProfit) => true,
            (PositionSide::Long, TriggerTag::TakeProfit)
            | (PositionSide::Short, TriggerTag::StopLoss | TriggerTag::TrailingStop) => false,
        }
    }

    /// Check whether the given price satisfies this trigger.
    #[must_use]
    pub fn is_hit(&self, price: Decimal) -> bool {
        if self.fires_on_fall() {
            price <= self.threshold
        } else {
            price >= self.threshold
        }
    }

    /// For trailing stops: the new threshold implied by `price`, if the move
    /// improves the position's favor beyond the trailing distance.
    ///
    /// Returns `None` for fixed triggers and for prices that would move the
    /// threshold backwards (the ratchet never retreats).
    #[must_use]
    pub fn ratchet_candidate(&self, price: Decimal) -> Option<Decimal> {
        let TriggerKind::TrailingStop { distance } = self.kind else {
            return None;
        };

        let candidate = match self.side {
            PositionSide::Long => price - distance,
            PositionSide::Short => price + distance,
        };

        let improves = match self.side {
            PositionSide::Long => candidate > self.threshold,
            PositionSide::Short => candidate < self.threshold,
        };

        improves.then_some(candidate)
    }

    /// The position this trigger belongs to.
    #[must_use]
    pub const fn position_ref(&self) -> PositionId {
        self.id.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Symbol;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn trigger(side: PositionSide, kind: TriggerKind, threshold: Decimal) -> Trigger {
        Trigger {
            id: TriggerId::derive(PositionId::new(1), kind.tag()),
            symbol: Symbol::new("BTCUSDT"),
            side,
            kind,
            threshold,
            version: 1,
        }
    }

    #[test_case(PositionSide::Long, TriggerKind::StopLoss, dec!(100), dec!(99), true; "long sl below")]
    #[test_case(PositionSide::Long, TriggerKind::StopLoss, dec!(100), dec!(100), true; "long sl touch")]
    #[test_case(PositionSide::Long, TriggerKind::StopLoss, dec!(100), dec!(101), false; "long sl above")]
    #[test_case(PositionSide::Long, TriggerKind::TakeProfit, dec!(120), dec!(121), true; "long tp above")]
    #[test_case(PositionSide::Long, TriggerKind::TakeProfit, dec!(120), dec!(119), false; "long tp below")]
    #[test_case(PositionSide::Short, TriggerKind::StopLoss, dec!(100), dec!(101), true; "short sl above")]
    #[test_case(PositionSide::Short, TriggerKind::StopLoss, dec!(100), dec!(99), false; "short sl below")]
    #[test_case(PositionSide::Short, TriggerKind::TakeProfit, dec!(80), dec!(79), true; "short tp below")]
    #[test_case(PositionSide::Short, TriggerKind::TakeProfit, dec!(80), dec!(81), false; "short tp above")]
    fn hit_comparisons(
        side: PositionSide,
        kind: TriggerKind,
        threshold: Decimal,
        price: Decimal,
        expected: bool,
    ) {
        assert_eq!(trigger(side, kind, threshold).is_hit(price), expected);
    }

    #[test]
    fn trailing_hit_uses_current_threshold() {
        let t = trigger(
            PositionSide::Long,
            TriggerKind::TrailingStop { distance: dec!(5) },
            dec!(95),
        );
        assert!(t.is_hit(dec!(94)));
        assert!(!t.is_hit(dec!(96)));
    }

    #[test]
    fn ratchet_candidate_long_improves() {
        let t = trigger(
            PositionSide::Long,
            TriggerKind::TrailingStop { distance: dec!(5) },
            dec!(95),
        );
        // 108 - 5 = 103 > 95: ratchet moves up
        assert_eq!(t.ratchet_candidate(dec!(108)), Some(dec!(103)));
        // 99 - 5 = 94 < 95: never retreats
        assert_eq!(t.ratchet_candidate(dec!(99)), None);
    }

    #[test]
    fn ratchet_candidate_short_improves() {
        let t = trigger(
            PositionSide::Short,
            TriggerKind::TrailingStop { distance: dec!(5) },
            dec!(105),
        );
        // 95 + 5 = 100 < 105: ratchet moves down
        assert_eq!(t.ratchet_candidate(dec!(95)), Some(dec!(100)));
        assert_eq!(t.ratchet_candidate(dec!(104)), None);
    }

    #[test]
    fn ratchet_candidate_fixed_trigger_is_none() {
        let t = trigger(PositionSide::Long, TriggerKind::StopLoss, dec!(100));
        assert_eq!(t.ratchet_candidate(dec!(200)), None);
    }

    #[test]
    fn trigger_id_is_stable_and_displayable() {
        let id = TriggerId::derive(PositionId::new(42), TriggerTag::StopLoss);
        assert_eq!(id.to_string(), "42:sl");
        assert_eq!(id, TriggerId::derive(PositionId::new(42), TriggerTag::StopLoss));
    }
}
