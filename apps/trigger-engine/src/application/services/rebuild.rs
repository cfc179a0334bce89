//! Index rebuild scheduling and incremental updates.
//!
//! The full rebuild is the safety net: on a fixed interval the persistence
//! collaborator is asked for every open position with triggers and a fresh
//! index snapshot is built off to the side. Position changes between cycles
//! arrive through [`apply_incremental`], version-gated per trigger.
//!
//! Failure policy: a failed rebuild leaves the previous index live (fail-open
//! on the cache) and is retried on the next interval; a run of consecutive
//! failures escalates operationally but never halts tick processing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::time::timeout;

use crate::application::ports::PositionRepositoryPort;
use crate::domain::shared::PositionId;
use crate::domain::trigger_watch::{
    ChangeKind, FiredMarker, FiredMarkers, HitKind, PositionChange, TriggerIndex, TriggerTag,
    UpsertOutcome,
};
use crate::observability::metrics::{record_incremental_update, record_rebuild};

/// Result of one full rebuild cycle.
#[derive(Debug)]
pub enum RebuildOutcome {
    /// A fresh snapshot, ready to swap in.
    Rebuilt(TriggerIndex),
    /// The persistence query failed or timed out; the previous index stays
    /// live.
    Failed {
        /// Failed cycles in a row, including this one.
        consecutive_failures: u32,
        /// Whether the failure run crossed the escalation threshold.
        escalated: bool,
    },
}

/// Result of applying one incremental position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalOutcome {
    /// The change was applied to the index.
    Applied,
    /// The change was older than the indexed state and was dropped.
    Stale,
}

/// Periodically reconstructs the trigger index from persistence.
#[derive(Debug)]
pub struct RebuildScheduler<R> {
    repo: Arc<R>,
    query_timeout: Duration,
    escalation_threshold: u32,
    consecutive_failures: u32,
    last_success_at: Option<DateTime<Utc>>,
}

impl<R: PositionRepositoryPort> RebuildScheduler<R> {
    /// Create a scheduler over the given repository.
    #[must_use]
    pub const fn new(repo: Arc<R>, query_timeout: Duration, escalation_threshold: u32) -> Self {
        Self {
            repo,
            query_timeout,
            escalation_threshold,
            consecutive_failures: 0,
            last_success_at: None,
        }
    }

    /// Query persistence and build a fresh index snapshot.
    ///
    /// The query is bounded by the configured timeout; a timeout counts as a
    /// failed cycle rather than blocking the loop.
    pub async fn full_rebuild(&mut self) -> RebuildOutcome {
        let started = Instant::now();

        let result = timeout(
            self.query_timeout,
            self.repo.list_open_positions_with_triggers(),
        )
        .await;

        match result {
            Ok(Ok(records)) => {
                let index = TriggerIndex::from_records(&records);
                self.consecutive_failures = 0;
                self.last_success_at = Some(Utc::now());
                record_rebuild("ok", started.elapsed().as_secs_f64());

                tracing::debug!(
                    positions = records.len(),
                    triggers = index.len(),
                    symbols = index.symbol_count(),
                    "index rebuilt"
                );

                RebuildOutcome::Rebuilt(index)
            }
            Ok(Err(e)) => self.fail(started, &e.to_string()),
            Err(_) => self.fail(
                started,
                &format!("query timed out after {:?}", self.query_timeout),
            ),
        }
    }

    fn fail(&mut self, started: Instant, message: &str) -> RebuildOutcome {
        self.consecutive_failures += 1;
        record_rebuild("failed", started.elapsed().as_secs_f64());

        let escalated = self.consecutive_failures >= self.escalation_threshold;
        if escalated {
            tracing::error!(
                consecutive = self.consecutive_failures,
                error = message,
                "index rebuild failing persistently, serving stale index"
            );
        } else {
            tracing::warn!(
                consecutive = self.consecutive_failures,
                error = message,
                "index rebuild failed, keeping previous index"
            );
        }

        RebuildOutcome::Failed {
            consecutive_failures: self.consecutive_failures,
            escalated,
        }
    }

    /// Failed cycles since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When the last successful rebuild finished.
    #[must_use]
    pub const fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }
}

/// Apply one position change to the live index without a full rebuild.
///
/// Changes are version-gated per trigger: an update older than (or equal to)
/// the indexed state is dropped, so replayed or out-of-order events cannot
/// regress the index. Fired markers are cleared exactly when their trigger
/// leaves the index.
pub fn apply_incremental(
    index: &mut TriggerIndex,
    markers: &mut FiredMarkers,
    change: PositionChange,
) -> IncrementalOutcome {
    let position = change.position_id;

    let outcome = match change.kind {
        ChangeKind::Closed => {
            let removed = index.remove_position(position, change.version);
            let still_indexed = index
                .trigger_ids()
                .iter()
                .any(|id| id.position() == position);

            if still_indexed {
                // Newer record versions survived the gate: the close event is
                // a replay.
                IncrementalOutcome::Stale
            } else {
                if !removed.is_empty() {
                    tracing::info!(
                        position = %position,
                        triggers = removed.len(),
                        "position closed, triggers removed"
                    );
                }
                markers.clear_position(position);
                IncrementalOutcome::Applied
            }
        }
        ChangeKind::Opened | ChangeKind::Modified => {
            let Some(record) = change.record else {
                tracing::warn!(
                    position = %position,
                    kind = ?change.kind,
                    "position change without record payload dropped"
                );
                return IncrementalOutcome::Stale;
            };

            let projected = record.project_triggers();
            let configured: Vec<TriggerTag> = projected.iter().map(|t| t.id.tag()).collect();

            let mut any_applied = false;
            for trigger in projected {
                match index.upsert(trigger) {
                    UpsertOutcome::Applied => any_applied = true,
                    UpsertOutcome::Stale => {}
                }
            }

            // Kinds the new record no longer configures go away, along with
            // the markers they guarded.
            for id in index.trigger_ids() {
                if id.position() != position || configured.contains(&id.tag()) {
                    continue;
                }
                let outdated = index.get(id).is_some_and(|t| t.version <= change.version);
                if outdated && index.remove(id).is_some() {
                    clear_markers_for_tag(markers, change.position_id, id.tag());
                    any_applied = true;
                }
            }

            if any_applied {
                IncrementalOutcome::Applied
            } else {
                IncrementalOutcome::Stale
            }
        }
    };

    match outcome {
        IncrementalOutcome::Applied => record_incremental_update("applied"),
        IncrementalOutcome::Stale => {
            tracing::debug!(position = %position, "stale incremental update dropped");
            record_incremental_update("stale");
        }
    }

    outcome
}

fn clear_markers_for_tag(markers: &mut FiredMarkers, position: PositionId, tag: TriggerTag) {
    match tag {
        TriggerTag::StopLoss => {
            markers.clear(FiredMarker::new(position, HitKind::StopLoss));
            markers.clear(FiredMarker::new(position, HitKind::NearStopLoss));
        }
        TriggerTag::TakeProfit => {
            markers.clear(FiredMarker::new(position, HitKind::TakeProfit));
            markers.clear(FiredMarker::new(position, HitKind::NearTakeProfit));
        }
        TriggerTag::TrailingStop => {
            markers.clear(FiredMarker::new(position, HitKind::TrailingStop));
        }
    }
}
