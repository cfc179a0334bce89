//! Hit events and fired-marker keys.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trigger::{Trigger, TriggerId, TriggerTag};
use crate::domain::shared::{PositionId, Symbol};

/// What fired.
///
/// The three closing kinds correspond one-to-one to indexed triggers. The two
/// near-touch kinds are advisory alerts emitted while price approaches a
/// level; they notify but never close the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// Stop-loss satisfied.
    StopLoss,
    /// Take-profit satisfied.
    TakeProfit,
    /// Trailing stop satisfied.
    TrailingStop,
    /// Price entered the warning band above/below the stop-loss.
    NearStopLoss,
    /// Price entered the warning band short of the take-profit.
    NearTakeProfit,
}

impl HitKind {
    /// Stable string form for logs and metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::TrailingStop => "trailing_stop",
            Self::NearStopLoss => "near_stop_loss",
            Self::NearTakeProfit => "near_take_profit",
        }
    }

    /// Whether this hit should close the position downstream.
    #[must_use]
    pub const fn closes_position(self) -> bool {
        matches!(self, Self::StopLoss | Self::TakeProfit | Self::TrailingStop)
    }

    /// The indexed trigger kind whose presence keeps this hit's fired marker
    /// alive across rebuilds.
    #[must_use]
    pub const fn guard_tag(self) -> TriggerTag {
        match self {
            Self::StopLoss | Self::NearStopLoss => TriggerTag::StopLoss,
            Self::TakeProfit | Self::NearTakeProfit => TriggerTag::TakeProfit,
            Self::TrailingStop => TriggerTag::TrailingStop,
        }
    }

    /// Kind for a satisfied indexed trigger.
    #[must_use]
    pub const fn from_tag(tag: TriggerTag) -> Self {
        match tag {
            TriggerTag::StopLoss => Self::StopLoss,
            TriggerTag::TakeProfit => Self::TakeProfit,
            TriggerTag::TrailingStop => Self::TrailingStop,
        }
    }
}

impl std::fmt::Display for HitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deduplication key for a fired event.
///
/// For closing hits this is exactly the trigger identity; near-touch alerts
/// extend the key space so each advisory fires at most once per level as
/// well. Markers are keyed by identity, not by index instance, so they
/// survive index replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiredMarker {
    /// Owning position.
    pub position: PositionId,
    /// Which event fired.
    pub kind: HitKind,
}

impl FiredMarker {
    /// Build the marker for a position/kind pair.
    #[must_use]
    pub const fn new(position: PositionId, kind: HitKind) -> Self {
        Self { position, kind }
    }

    /// The indexed trigger whose continued presence keeps this marker alive.
    #[must_use]
    pub const fn guard_trigger(&self) -> TriggerId {
        TriggerId::derive(self.position, self.kind.guard_tag())
    }
}

/// A trigger satisfied by an observed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerHit {
    /// Unique id of this hit event.
    pub event_id: Uuid,
    /// Owning position, handed back to the trade-update collaborator.
    pub position_ref: PositionId,
    /// Instrument the tick was observed on.
    pub symbol: Symbol,
    /// What fired.
    pub kind: HitKind,
    /// Threshold that was satisfied (post-ratchet for trailing stops).
    pub threshold: Decimal,
    /// Observed tick price.
    pub price: Decimal,
    /// Observed tick time.
    pub at: DateTime<Utc>,
}

impl TriggerHit {
    /// Build a hit event from a satisfied indexed trigger.
    #[must_use]
    pub fn from_trigger(trigger: &Trigger, price: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            position_ref: trigger.position_ref(),
            symbol: trigger.symbol.clone(),
            kind: HitKind::from_tag(trigger.id.tag()),
            threshold: trigger.threshold,
            price,
            at,
        }
    }

    /// Build a near-touch advisory for a trigger's level.
    #[must_use]
    pub fn near(trigger: &Trigger, kind: HitKind, price: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            position_ref: trigger.position_ref(),
            symbol: trigger.symbol.clone(),
            kind,
            threshold: trigger.threshold,
            price,
            at,
        }
    }

    /// Deduplication key for this hit.
    #[must_use]
    pub const fn marker(&self) -> FiredMarker {
        FiredMarker::new(self.position_ref, self.kind)
    }
}
