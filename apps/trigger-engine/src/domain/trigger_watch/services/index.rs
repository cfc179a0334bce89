//! In-memory trigger index.
//!
//! Maps instrument → threshold-ordered trigger buckets so a tick can be
//! matched in sub-linear time per instrument. Each instrument keeps two
//! vectors: "floor" triggers fire when price falls to or below their
//! threshold (long stop-loss/trailing, short take-profit) and are sorted
//! descending; "ceiling" triggers fire when price rises to or above their
//! threshold and are sorted ascending. Satisfied triggers therefore always
//! form a prefix of each vector.
//!
//! A rebuild constructs a whole new `TriggerIndex` off to the side and the
//! owning loop swaps it in as a single assignment, so readers never observe
//! a partially built index.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::shared::{PositionId, Symbol};
use crate::domain::trigger_watch::errors::TriggerWatchError;
use crate::domain::trigger_watch::value_objects::{
    PositionRecord, PositionSide, Trigger, TriggerId, TriggerKind,
};

/// Result of a version-gated incremental change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The change was newer than the indexed state and was applied.
    Applied,
    /// The change was older than (or equal to) the indexed state and was
    /// dropped.
    Stale,
}

#[derive(Debug, Clone, Default)]
struct SymbolBucket {
    /// Sorted descending by threshold; a tick at price `p` satisfies the
    /// prefix with `threshold >= p`.
    floor: Vec<Trigger>,
    /// Sorted ascending by threshold; a tick at price `p` satisfies the
    /// prefix with `threshold <= p`.
    ceiling: Vec<Trigger>,
}

impl SymbolBucket {
    fn insert(&mut self, trigger: Trigger) {
        if trigger.fires_on_fall() {
            let at = self
                .floor
                .partition_point(|t| t.threshold > trigger.threshold);
            self.floor.insert(at, trigger);
        } else {
            let at = self
                .ceiling
                .partition_point(|t| t.threshold < trigger.threshold);
            self.ceiling.insert(at, trigger);
        }
    }

    fn remove(&mut self, id: TriggerId) -> Option<Trigger> {
        if let Some(at) = self.floor.iter().position(|t| t.id == id) {
            return Some(self.floor.remove(at));
        }
        if let Some(at) = self.ceiling.iter().position(|t| t.id == id) {
            return Some(self.ceiling.remove(at));
        }
        None
    }

    fn get(&self, id: TriggerId) -> Option<&Trigger> {
        self.iter().find(|t| t.id == id)
    }

    fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.floor.iter().chain(self.ceiling.iter())
    }

    fn satisfied(&self, price: Decimal) -> impl Iterator<Item = &Trigger> {
        let floor = self.floor.iter().take_while(move |t| t.threshold >= price);
        let ceiling = self
            .ceiling
            .iter()
            .take_while(move |t| t.threshold <= price);
        floor.chain(ceiling)
    }

    fn len(&self) -> usize {
        self.floor.len() + self.ceiling.len()
    }

    fn is_empty(&self) -> bool {
        self.floor.is_empty() && self.ceiling.is_empty()
    }
}

/// Instrument → active triggers, with point lookups by tick price.
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    buckets: HashMap<Symbol, SymbolBucket>,
    locations: HashMap<TriggerId, Symbol>,
}

impl TriggerIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a full snapshot from open position records.
    #[must_use]
    pub fn from_records(records: &[PositionRecord]) -> Self {
        let mut index = Self::new();
        for record in records {
            for trigger in record.project_triggers() {
                index.insert(trigger);
            }
        }
        index
    }

    /// Atomically swap in a fully built snapshot.
    ///
    /// The replacement is constructed off to the side and becomes visible in
    /// one assignment; there is no intermediate state to observe.
    pub fn replace(&mut self, snapshot: Self) {
        *self = snapshot;
    }

    /// Insert a trigger unconditionally, replacing any previous entry with
    /// the same id. Used on the snapshot build path.
    pub fn insert(&mut self, trigger: Trigger) {
        self.evict(trigger.id);
        self.locations.insert(trigger.id, trigger.symbol.clone());
        self.buckets
            .entry(trigger.symbol.clone())
            .or_default()
            .insert(trigger);
    }

    /// Apply a version-gated incremental change for a single trigger.
    ///
    /// A change with a version lower than or equal to the indexed one is
    /// dropped as stale; `[1, 3, 2]` leaves the state of version 3.
    pub fn upsert(&mut self, trigger: Trigger) -> UpsertOutcome {
        if let Some(existing) = self.get(trigger.id)
            && existing.version >= trigger.version
        {
            return UpsertOutcome::Stale;
        }

        self.insert(trigger);
        UpsertOutcome::Applied
    }

    /// Remove a single trigger.
    pub fn remove(&mut self, id: TriggerId) -> Option<Trigger> {
        self.evict(id)
    }

    /// Remove all triggers of a closed position whose indexed version is not
    /// newer than the close event.
    ///
    /// Returns the removed trigger ids.
    pub fn remove_position(&mut self, position: PositionId, version: u64) -> Vec<TriggerId> {
        let ids: Vec<TriggerId> = self
            .locations
            .keys()
            .filter(|id| id.position() == position)
            .copied()
            .collect();

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let stale = self.get(id).is_some_and(|t| t.version > version);
            if stale {
                continue;
            }
            if self.evict(id).is_some() {
                removed.push(id);
            }
        }
        removed
    }

    /// Move a trailing stop's threshold in the position's favor.
    ///
    /// This is the internal adjustment path and is not version-gated; the
    /// ratchet is monotonic and a non-improving value is a no-op. Returns
    /// whether the threshold moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the trigger is unknown or not a trailing stop.
    pub fn ratchet(
        &mut self,
        id: TriggerId,
        new_threshold: Decimal,
    ) -> Result<bool, TriggerWatchError> {
        let symbol = self
            .locations
            .get(&id)
            .cloned()
            .ok_or(TriggerWatchError::UnknownTrigger { id })?;

        let bucket = self
            .buckets
            .get_mut(&symbol)
            .ok_or(TriggerWatchError::UnknownTrigger { id })?;

        let Some(mut trigger) = bucket.remove(id) else {
            return Err(TriggerWatchError::UnknownTrigger { id });
        };

        if !matches!(trigger.kind, TriggerKind::TrailingStop { .. }) {
            bucket.insert(trigger);
            return Err(TriggerWatchError::NotTrailing { id });
        }

        let improves = match trigger.side {
            PositionSide::Long => new_threshold > trigger.threshold,
            PositionSide::Short => new_threshold < trigger.threshold,
        };
        if improves {
            trigger.threshold = new_threshold;
        }
        bucket.insert(trigger);

        Ok(improves)
    }

    /// Triggers satisfied by a tick at `price` on `symbol`.
    ///
    /// Candidates are exactly the satisfied triggers: each bucket is scanned
    /// from its sorted end with early exit, so the cost is proportional to
    /// the number of hits, not the instrument's trigger count.
    #[must_use]
    pub fn lookup(&self, symbol: &Symbol, price: Decimal) -> Vec<&Trigger> {
        self.buckets
            .get(symbol)
            .map(|bucket| bucket.satisfied(price).collect())
            .unwrap_or_default()
    }

    /// All triggers for an instrument, in bucket order.
    pub fn triggers_for<'a>(&'a self, symbol: &Symbol) -> impl Iterator<Item = &'a Trigger> {
        self.buckets.get(symbol).into_iter().flat_map(SymbolBucket::iter)
    }

    /// Look up a trigger by id.
    #[must_use]
    pub fn get(&self, id: TriggerId) -> Option<&Trigger> {
        let symbol = self.locations.get(&id)?;
        self.buckets.get(symbol)?.get(id)
    }

    /// Whether a trigger is present.
    #[must_use]
    pub fn contains(&self, id: TriggerId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Number of active triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the index holds no triggers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of instruments with at least one active trigger.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.buckets.len()
    }

    /// Sorted set of instruments with at least one active trigger.
    ///
    /// This is the instrument set the price feed must cover.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.buckets.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// All trigger ids currently indexed.
    #[must_use]
    pub fn trigger_ids(&self) -> Vec<TriggerId> {
        self.locations.keys().copied().collect()
    }

    fn evict(&mut self, id: TriggerId) -> Option<Trigger> {
        let symbol = self.locations.remove(&id)?;
        let bucket = self.buckets.get_mut(&symbol)?;
        let removed = bucket.remove(id);
        if bucket.is_empty() {
            self.buckets.remove(&symbol);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trigger_watch::value_objects::TriggerTag;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn trigger(
        position: i64,
        symbol: &str,
        side: PositionSide,
        kind: TriggerKind,
        threshold: Decimal,
        version: u64,
    ) -> Trigger {
        Trigger {
            id: TriggerId::derive(PositionId::new(position), kind.tag()),
            symbol: Symbol::new(symbol),
            side,
            kind,
            threshold,
            version,
        }
    }

    #[test]
    fn lookup_returns_satisfied_prefix_only() {
        let mut index = TriggerIndex::new();
        // Long stops at 90, 95, 100 (floor bucket).
        for (pos, level) in [(1, dec!(90)), (2, dec!(95)), (3, dec!(100))] {
            index.insert(trigger(
                pos,
                "BTCUSDT",
                PositionSide::Long,
                TriggerKind::StopLoss,
                level,
                1,
            ));
        }

        let hits = index.lookup(&Symbol::new("BTCUSDT"), dec!(96));
        let levels: Vec<Decimal> = hits.iter().map(|t| t.threshold).collect();
        assert_eq!(levels, vec![dec!(100)]);

        let hits = index.lookup(&Symbol::new("BTCUSDT"), dec!(94));
        let levels: Vec<Decimal> = hits.iter().map(|t| t.threshold).collect();
        assert_eq!(levels, vec![dec!(100), dec!(95)]);
    }

    #[test]
    fn lookup_spans_both_buckets() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            1,
        ));
        index.insert(trigger(
            2,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::TakeProfit,
            dec!(90),
            1,
        ));

        // Overlapping levels (stop above target): a tick between them
        // satisfies both buckets at once.
        let hits = index.lookup(&Symbol::new("BTCUSDT"), dec!(95));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn lookup_unknown_symbol_is_empty() {
        let index = TriggerIndex::new();
        assert!(index.lookup(&Symbol::new("BTCUSDT"), dec!(1)).is_empty());
    }

    #[test]
    fn upsert_drops_stale_versions() {
        let mut index = TriggerIndex::new();
        let make = |version: u64, level: Decimal| {
            trigger(
                1,
                "BTCUSDT",
                PositionSide::Long,
                TriggerKind::StopLoss,
                level,
                version,
            )
        };

        assert_eq!(index.upsert(make(1, dec!(100))), UpsertOutcome::Applied);
        assert_eq!(index.upsert(make(3, dec!(102))), UpsertOutcome::Applied);
        assert_eq!(index.upsert(make(2, dec!(101))), UpsertOutcome::Stale);

        let id = TriggerId::derive(PositionId::new(1), TriggerTag::StopLoss);
        let current = index.get(id).unwrap();
        assert_eq!(current.version, 3);
        assert_eq!(current.threshold, dec!(102));
    }

    #[test]
    fn upsert_drops_duplicate_version() {
        let mut index = TriggerIndex::new();
        let make = |level: Decimal| {
            trigger(
                1,
                "BTCUSDT",
                PositionSide::Long,
                TriggerKind::StopLoss,
                level,
                5,
            )
        };

        assert_eq!(index.upsert(make(dec!(100))), UpsertOutcome::Applied);
        assert_eq!(index.upsert(make(dec!(90))), UpsertOutcome::Stale);
        let id = TriggerId::derive(PositionId::new(1), TriggerTag::StopLoss);
        assert_eq!(index.get(id).unwrap().threshold, dec!(100));
    }

    #[test]
    fn remove_position_clears_all_kinds_and_symbol() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            1,
        ));
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::TakeProfit,
            dec!(120),
            1,
        ));

        let removed = index.remove_position(PositionId::new(1), 2);
        assert_eq!(removed.len(), 2);
        assert!(index.is_empty());
        assert!(index.symbols().is_empty());
    }

    #[test]
    fn remove_position_skips_newer_records() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            7,
        ));

        // Replayed close at version 4 is stale relative to the record.
        let removed = index.remove_position(PositionId::new(1), 4);
        assert!(removed.is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn ratchet_moves_forward_only() {
        let mut index = TriggerIndex::new();
        let kind = TriggerKind::TrailingStop { distance: dec!(5) };
        index.insert(trigger(1, "BTCUSDT", PositionSide::Long, kind, dec!(95), 1));
        let id = TriggerId::derive(PositionId::new(1), TriggerTag::TrailingStop);

        assert_eq!(index.ratchet(id, dec!(103)), Ok(true));
        assert_eq!(index.get(id).unwrap().threshold, dec!(103));

        // Never retreats.
        assert_eq!(index.ratchet(id, dec!(99)), Ok(false));
        assert_eq!(index.get(id).unwrap().threshold, dec!(103));
    }

    #[test]
    fn ratchet_rejects_fixed_triggers() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            1,
        ));
        let id = TriggerId::derive(PositionId::new(1), TriggerTag::StopLoss);

        assert_eq!(
            index.ratchet(id, dec!(101)),
            Err(TriggerWatchError::NotTrailing { id })
        );
        // Trigger survives the rejected adjustment.
        assert!(index.contains(id));
    }

    #[test]
    fn replace_swaps_the_whole_snapshot() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "BTCUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            1,
        ));

        let mut snapshot = TriggerIndex::new();
        snapshot.insert(trigger(
            2,
            "ETHUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(2000),
            1,
        ));

        index.replace(snapshot);

        // Only the new snapshot's contents are visible.
        assert!(index.lookup(&Symbol::new("BTCUSDT"), dec!(1)).is_empty());
        assert_eq!(index.lookup(&Symbol::new("ETHUSDT"), dec!(1999)).len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn symbols_reflect_live_instruments() {
        let mut index = TriggerIndex::new();
        index.insert(trigger(
            1,
            "ETHUSDT",
            PositionSide::Long,
            TriggerKind::StopLoss,
            dec!(100),
            1,
        ));
        index.insert(trigger(
            2,
            "BTCUSDT",
            PositionSide::Short,
            TriggerKind::TakeProfit,
            dec!(50),
            1,
        ));

        assert_eq!(
            index.symbols(),
            vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")]
        );
    }

    proptest! {
        /// A trigger is returned by lookup iff its kind-specific comparison
        /// holds for the tick price.
        #[test]
        fn lookup_matches_comparison(
            thresholds in proptest::collection::vec(1u32..10_000, 1..40),
            price in 1u32..10_000,
            long in proptest::bool::ANY,
            stop in proptest::bool::ANY,
        ) {
            let side = if long { PositionSide::Long } else { PositionSide::Short };
            let kind = if stop { TriggerKind::StopLoss } else { TriggerKind::TakeProfit };

            let mut index = TriggerIndex::new();
            let mut all = Vec::new();
            for (i, level) in thresholds.iter().enumerate() {
                let t = trigger(
                    i as i64,
                    "BTCUSDT",
                    side,
                    kind,
                    Decimal::from(*level),
                    1,
                );
                all.push(t.clone());
                index.insert(t);
            }

            let tick = Decimal::from(price);
            let mut looked_up: Vec<TriggerId> = index
                .lookup(&Symbol::new("BTCUSDT"), tick)
                .iter()
                .map(|t| t.id)
                .collect();
            let mut expected: Vec<TriggerId> = all
                .iter()
                .filter(|t| t.is_hit(tick))
                .map(|t| t.id)
                .collect();

            looked_up.sort_by_key(|id| id.position());
            expected.sort_by_key(|id| id.position());
            prop_assert_eq!(looked_up, expected);
        }
    }
}
