//! Queue item records and their status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mutation::{Mutation, MutationKind};
use crate::error::VitalSyncError;

/// Status of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting to be replayed
    Pending,
    /// Currently being replayed
    Syncing,
    /// Applied on the server
    Synced,
    /// Gave up after the retry ceiling
    Failed,
    /// Rejected by the server because its state diverged
    Conflict,
}

impl ItemStatus {
    /// Whether the drain loop should attempt this item.
    ///
    /// `Syncing` is only ever observed at rest when a previous drain was
    /// interrupted mid-item, so it is replayed like `Pending`.
    #[must_use]
    pub const fn is_replayable(&self) -> bool {
        matches!(self, Self::Pending | Self::Syncing)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::Conflict => "conflict",
        };
        write!(f, "{s}")
    }
}

/// Policy applied when the server reports a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Discard the local mutation and defer to the server.
    ServerWins,
    /// Replay the local mutation on the next drain.
    ClientWins,
    /// Park the item until someone decides.
    Manual,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ServerWins => "server-wins",
            Self::ClientWins => "client-wins",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ConflictResolution {
    type Err = VitalSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "server-wins" | "server" => Ok(Self::ServerWins),
            "client-wins" | "client" => Ok(Self::ClientWins),
            "manual" => Ok(Self::Manual),
            _ => Err(VitalSyncError::InvalidInput(format!(
                "Unknown conflict resolution: {s}"
            ))),
        }
    }
}

/// A durable record of one pending client-side mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique ID, never reused
    pub id: String,
    /// The mutation and its payload
    pub mutation: Mutation,
    /// When the item was queued
    pub created_at: DateTime<Utc>,
    /// Failed apply attempts since the last reset
    pub retry_count: u32,
    /// Current status
    pub status: ItemStatus,
    /// Last error reported by the applier
    pub last_error: Option<String>,
    /// Conflict policy, if one has been chosen
    pub conflict_resolution: Option<ConflictResolution>,
    /// When the item was last handed to an applier
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Create a new pending item with a fresh ID.
    #[must_use]
    pub fn new(mutation: Mutation) -> Self {
        Self {
            id: generate_id(),
            mutation,
            created_at: Utc::now(),
            retry_count: 0,
            status: ItemStatus::Pending,
            last_error: None,
            conflict_resolution: None,
            last_attempt_at: None,
        }
    }

    /// Get the mutation kind.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }

    /// Put the item back in line as if freshly queued.
    pub fn reset_for_retry(&mut self) {
        self.retry_count = 0;
        self.status = ItemStatus::Pending;
        self.last_error = None;
    }
}

/// Generate an item ID: enqueue time in milliseconds plus a random suffix.
#[must_use]
pub fn generate_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("{}-{suffix}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mutation::ProfileUpdate;

    fn profile(name: &str) -> Mutation {
        Mutation::ProfileUpdate(ProfileUpdate {
            user_id: "U-1".to_string(),
            name: Some(name.to_string()),
            email: None,
            phone: None,
            emergency_contact: None,
        })
    }

    #[test]
    fn test_new_item_defaults() {
        let item = QueueItem::new(profile("A"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert!(item.last_error.is_none());
        assert!(item.conflict_resolution.is_none());
        assert_eq!(item.kind(), MutationKind::ProfileUpdate);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);

        let (millis, suffix) = a.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
    }

    #[test]
    fn test_reset_for_retry() {
        let mut item = QueueItem::new(profile("A"));
        item.retry_count = 3;
        item.status = ItemStatus::Failed;
        item.last_error = Some("timeout".to_string());

        item.reset_for_retry();

        assert_eq!(item.retry_count, 0);
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn test_status_replayable() {
        assert!(ItemStatus::Pending.is_replayable());
        assert!(ItemStatus::Syncing.is_replayable());
        assert!(!ItemStatus::Conflict.is_replayable());
        assert!(!ItemStatus::Failed.is_replayable());
        assert!(!ItemStatus::Synced.is_replayable());
    }

    #[test]
    fn test_conflict_resolution_parse() {
        assert_eq!(
            "server-wins".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::ServerWins
        );
        assert_eq!(
            "client_wins".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::ClientWins
        );
        assert_eq!(
            "Manual".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::Manual
        );
        assert!("coin-flip".parse::<ConflictResolution>().is_err());
    }
}
