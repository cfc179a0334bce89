//! Fired-event deduplication.
//!
//! Guards against two hazards: a tick burst matching the same trigger many
//! times before the position close propagates through persistence, and a
//! rebuild cycle re-adding a trigger whose close is still in flight. Markers
//! are keyed by identity, not by index instance, so they survive wholesale
//! index replacement.

use std::collections::HashSet;

use crate::domain::shared::PositionId;
use crate::domain::trigger_watch::value_objects::FiredMarker;

use super::index::TriggerIndex;

/// Set of events already reported, keyed by [`FiredMarker`].
#[derive(Debug, Clone, Default)]
pub struct FiredMarkers {
    reported: HashSet<FiredMarker>,
}

impl FiredMarkers {
    /// Create an empty marker set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event with this marker may still be reported.
    #[must_use]
    pub fn should_report(&self, marker: FiredMarker) -> bool {
        !self.reported.contains(&marker)
    }

    /// Record that an event with this marker was reported.
    pub fn mark_reported(&mut self, marker: FiredMarker) {
        self.reported.insert(marker);
    }

    /// Clear a single marker.
    pub fn clear(&mut self, marker: FiredMarker) {
        self.reported.remove(&marker);
    }

    /// Clear every marker belonging to a position.
    ///
    /// Called when the position closes or its triggers are removed through
    /// the incremental path.
    pub fn clear_position(&mut self, position: PositionId) {
        self.reported.retain(|m| m.position != position);
    }

    /// Drop markers whose guarding trigger is no longer indexed.
    ///
    /// Run after every full rebuild: a trigger absent from the fresh snapshot
    /// means its position closed or the level was cleared, so the marker's
    /// one-shot obligation is over. A trigger that is still present keeps its
    /// marker, which is what prevents re-firing while a close is in flight.
    pub fn retain_known(&mut self, index: &TriggerIndex) {
        self.reported
            .retain(|marker| index.contains(marker.guard_trigger()));
    }

    /// Number of live markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reported.len()
    }

    /// Whether no markers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Symbol;
    use crate::domain::trigger_watch::value_objects::{
        HitKind, PositionSide, Trigger, TriggerId, TriggerKind,
    };
    use rust_decimal_macros::dec;

    fn sl_marker(position: i64) -> FiredMarker {
        FiredMarker::new(PositionId::new(position), HitKind::StopLoss)
    }

    fn index_with_sl(position: i64) -> TriggerIndex {
        let mut index = TriggerIndex::new();
        let kind = TriggerKind::StopLoss;
        index.insert(Trigger {
            id: TriggerId::derive(PositionId::new(position), kind.tag()),
            symbol: Symbol::new("BTCUSDT"),
            side: PositionSide::Long,
            kind,
            threshold: dec!(100),
            version: 1,
        });
        index
    }

    #[test]
    fn reports_once_until_cleared() {
        let mut markers = FiredMarkers::new();
        let marker = sl_marker(1);

        assert!(markers.should_report(marker));
        markers.mark_reported(marker);
        assert!(!markers.should_report(marker));
        assert!(!markers.should_report(marker));

        markers.clear(marker);
        assert!(markers.should_report(marker));
    }

    #[test]
    fn survives_rebuild_while_trigger_present() {
        let mut markers = FiredMarkers::new();
        markers.mark_reported(sl_marker(1));

        // Rebuild still contains the trigger: the close is in flight.
        markers.retain_known(&index_with_sl(1));
        assert!(!markers.should_report(sl_marker(1)));
    }

    #[test]
    fn cleared_when_trigger_leaves_index() {
        let mut markers = FiredMarkers::new();
        markers.mark_reported(sl_marker(1));

        // Fresh snapshot no longer holds the trigger: position closed.
        markers.retain_known(&TriggerIndex::new());
        assert!(markers.should_report(sl_marker(1)));
    }

    #[test]
    fn near_marker_guarded_by_base_trigger() {
        let mut markers = FiredMarkers::new();
        let near = FiredMarker::new(PositionId::new(1), HitKind::NearStopLoss);
        markers.mark_reported(near);

        markers.retain_known(&index_with_sl(1));
        assert!(!markers.should_report(near));

        markers.retain_known(&TriggerIndex::new());
        assert!(markers.should_report(near));
    }

    #[test]
    fn clear_position_drops_all_marker_kinds() {
        let mut markers = FiredMarkers::new();
        markers.mark_reported(FiredMarker::new(PositionId::new(1), HitKind::StopLoss));
        markers.mark_reported(FiredMarker::new(PositionId::new(1), HitKind::NearTakeProfit));
        markers.mark_reported(FiredMarker::new(PositionId::new(2), HitKind::TakeProfit));

        markers.clear_position(PositionId::new(1));
        assert_eq!(markers.len(), 1);
        assert!(!markers.should_report(FiredMarker::new(PositionId::new(2), HitKind::TakeProfit)));
    }
}
