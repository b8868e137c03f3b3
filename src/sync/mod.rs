//! Offline mutation queue.
//!
//! Mutations made while offline are queued durably and replayed in order
//! when connectivity returns:
//! - Failed replays are retried up to a ceiling, then dead-lettered
//! - Server conflicts are settled by a per-item policy
//! - Every drain cycle is recorded in a capped history
//! - Observers are told when the queue length or drain state changes

mod applier;
mod engine;
mod history;
mod item;
mod mutation;
mod observer;

pub use applier::{apply, ApplyContext, ApplyError, ApplyResult, MutationApplier};
pub use engine::{DrainOutcome, QueueEngine, QueueSettings, QueueStatus};
pub use history::{push_capped, CycleCounters, ItemOutcome, SyncHistoryEntry};
pub use item::{generate_id, ConflictResolution, ItemStatus, QueueItem};
pub use mutation::{
    AlertAcknowledgement, DeviceRegistration, Mutation, MutationKind, NewStudent, ProfileUpdate,
    StudentUpdate, VitalReading,
};
pub use observer::{Listener, ListenerId, Observers, QueueSnapshot};
