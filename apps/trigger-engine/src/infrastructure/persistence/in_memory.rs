//! In-memory position repository.
//!
//! Backs the repository port with a plain map. Used by tests and by
//! embedders that feed the engine purely through the position-change
//! handoff; a deployment with a real store supplies its own adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::application::ports::{PositionRepositoryPort, RepositoryError};
use crate::domain::shared::PositionId;
use crate::domain::trigger_watch::PositionRecord;

/// In-memory implementation of `PositionRepositoryPort`.
#[derive(Debug, Default)]
pub struct InMemoryPositionRepository {
    positions: RwLock<HashMap<PositionId, PositionRecord>>,
    /// Number of upcoming list calls that should fail (test hook for the
    /// rebuild failure policy).
    outages_remaining: Mutex<u32>,
}

impl InMemoryPositionRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a position record.
    pub fn upsert(&self, record: PositionRecord) {
        self.positions.write().insert(record.id, record);
    }

    /// Remove a position (it closed).
    pub fn remove(&self, id: PositionId) -> Option<PositionRecord> {
        self.positions.write().remove(&id)
    }

    /// Number of stored positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }

    /// Make the next `times` list calls fail with an outage.
    pub fn fail_next(&self, times: u32) {
        *self.outages_remaining.lock() = times;
    }
}

#[async_trait]
impl PositionRepositoryPort for InMemoryPositionRepository {
    async fn list_open_positions_with_triggers(
        &self,
    ) -> Result<Vec<PositionRecord>, RepositoryError> {
        {
            let mut outages = self.outages_remaining.lock();
            if *outages > 0 {
                *outages -= 1;
                return Err(RepositoryError::Unavailable {
                    message: "injected outage".to_string(),
                });
            }
        }

        Ok(self
            .positions
            .read()
            .values()
            .filter(|record| {
                record.stop_loss.is_some()
                    || record.take_profit.is_some()
                    || record.trailing_stop.is_some()
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Symbol;
    use crate::domain::trigger_watch::PositionSide;
    use rust_decimal_macros::dec;

    fn record(id: i64, stop_loss: Option<rust_decimal::Decimal>) -> PositionRecord {
        PositionRecord {
            id: PositionId::new(id),
            symbol: Symbol::new("BTCUSDT"),
            side: PositionSide::Long,
            entry: dec!(110),
            stop_loss,
            take_profit: None,
            trailing_stop: None,
            version: 1,
        }
    }

    #[tokio::test]
    async fn lists_only_positions_with_triggers() {
        let repo = InMemoryPositionRepository::new();
        repo.upsert(record(1, Some(dec!(100))));
        repo.upsert(record(2, None));

        let listed = repo.list_open_positions_with_triggers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, PositionId::new(1));
    }

    #[tokio::test]
    async fn injected_outages_fail_then_recover() {
        let repo = InMemoryPositionRepository::new();
        repo.fail_next(2);

        assert!(repo.list_open_positions_with_triggers().await.is_err());
        assert!(repo.list_open_positions_with_triggers().await.is_err());
        assert!(repo.list_open_positions_with_triggers().await.is_ok());
    }

    #[tokio::test]
    async fn remove_drops_position() {
        let repo = InMemoryPositionRepository::new();
        repo.upsert(record(1, Some(dec!(100))));
        assert_eq!(repo.len(), 1);

        repo.remove(PositionId::new(1));
        assert!(repo.is_empty());
    }
}
