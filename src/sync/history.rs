//! Sync history: one audit record per drain cycle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::ConflictResolution;

/// How a single item left the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Applied on the server
    Synced,
    /// Failed, will be retried next cycle
    Retrying,
    /// Failed and reached the retry ceiling
    Failed,
    /// Conflicted and was resolved with the given policy
    Conflict(ConflictResolution),
}

/// Running totals for one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounters {
    /// Items handed to an applier
    pub processed: usize,
    /// Items that ended the cycle reconciled with the server
    pub succeeded: usize,
    /// Items that failed (retrying or exhausted)
    pub failed: usize,
    /// Items the server reported as conflicting
    pub conflicted: usize,
}

impl CycleCounters {
    /// Record one item's outcome.
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Synced => self.succeeded += 1,
            ItemOutcome::Retrying | ItemOutcome::Failed => self.failed += 1,
            // Deferring to the server counts as a reconciliation
            ItemOutcome::Conflict(ConflictResolution::ServerWins) => {
                self.conflicted += 1;
                self.succeeded += 1;
            },
            ItemOutcome::Conflict(_) => self.conflicted += 1,
        }
    }

    /// Record an item that was reset or removed while its apply was in flight.
    pub fn record_superseded(&mut self) {
        self.processed += 1;
    }
}

/// Immutable summary of one completed drain cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub items_processed: usize,
    pub items_succeeded: usize,
    pub items_failed: usize,
    #[serde(default)]
    pub items_conflicted: usize,
    pub duration_ms: u64,
}

impl SyncHistoryEntry {
    /// Build an entry for a cycle that started at `timestamp`.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, counters: CycleCounters, elapsed: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            items_processed: counters.processed,
            items_succeeded: counters.succeeded,
            items_failed: counters.failed,
            items_conflicted: counters.conflicted,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Append an entry, evicting the oldest ones beyond `limit`.
pub fn push_capped(history: &mut Vec<SyncHistoryEntry>, entry: SyncHistoryEntry, limit: usize) {
    history.push(entry);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}
