//! Queue engine: persistence, replay and conflict handling for offline mutations.
//!
//! The engine keeps three lists in the durable store:
//! - the live queue, in enqueue order
//! - the dead-letter list of items that exhausted their retries
//! - the capped sync history
//!
//! Every read-modify-write of a list holds `write_lock`, and the lock is never
//! held across an applier call, so enqueues and removals made while a drain
//! is waiting on the network are merged rather than overwritten.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use super::applier::{apply, ApplyContext, ApplyError, ApplyResult, MutationApplier};
use super::history::{push_capped, CycleCounters, ItemOutcome, SyncHistoryEntry};
use super::item::{generate_id, ConflictResolution, ItemStatus, QueueItem};
use super::mutation::Mutation;
use super::observer::{ListenerId, Observers, QueueSnapshot};
use crate::error::VitalSyncError;
use crate::storage::KeyValueStore;

/// Engine tuning and storage layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Failed attempts before an item is dead-lettered
    pub max_retries: u32,
    /// History entries kept
    pub history_limit: usize,
    /// Key of the live queue
    pub queue_key: String,
    /// Key of the dead-letter list
    pub failed_key: String,
    /// Key of the sync history
    pub history_key: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            history_limit: 50,
            queue_key: "offline_queue".to_string(),
            failed_key: "offline_queue_failed".to_string(),
            history_key: "sync_history".to_string(),
        }
    }
}

/// Result of a `process_queue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was running; nothing was done.
    AlreadyRunning,
    /// The queue was empty; no history was recorded.
    Empty,
    /// A cycle ran to completion.
    Completed(SyncHistoryEntry),
}

/// Item counts partitioned by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub syncing: usize,
    pub failed: usize,
    pub conflicts: usize,
}

/// The offline mutation queue.
pub struct QueueEngine {
    store: Arc<dyn KeyValueStore>,
    settings: QueueSettings,
    processing: AtomicBool,
    queue_length: AtomicUsize,
    write_lock: Mutex<()>,
    observers: Observers,
}

impl QueueEngine {
    /// Create an engine over a store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, settings: QueueSettings) -> Self {
        Self {
            store,
            settings,
            processing: AtomicBool::new(false),
            queue_length: AtomicUsize::new(0),
            write_lock: Mutex::new(()),
            observers: Observers::default(),
        }
    }

    /// Get the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Whether a drain is in progress.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Register a status observer.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        self.observers.add(Arc::new(listener))
    }

    /// Unregister a status observer. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.observers.remove(id)
    }

    /// Append a mutation to the queue and return its item ID.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be read or written.
    pub async fn enqueue(&self, mutation: Mutation) -> Result<String, VitalSyncError> {
        let kind = mutation.kind();
        let id = {
            let _lock = self.write_lock.lock().await;
            let mut queue = self.read_queue().await?;
            let failed: Vec<QueueItem> = self.read_list(&self.settings.failed_key).await?;

            let mut item = QueueItem::new(mutation);
            while queue.iter().chain(&failed).any(|existing| existing.id == item.id) {
                item.id = generate_id();
            }

            let id = item.id.clone();
            queue.push(item);
            self.write_queue(&queue).await?;
            id
        };

        tracing::debug!(%id, %kind, "Queued mutation");
        self.notify();
        Ok(id)
    }

    /// Alias of [`enqueue`](Self::enqueue).
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be read or written.
    pub async fn add_to_queue(&self, mutation: Mutation) -> Result<String, VitalSyncError> {
        self.enqueue(mutation).await
    }

    /// Get the live queue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_queue(&self) -> Result<Vec<QueueItem>, VitalSyncError> {
        self.read_queue().await
    }

    /// Get the dead-letter list, in the order items failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_failed_items(&self) -> Result<Vec<QueueItem>, VitalSyncError> {
        self.read_list(&self.settings.failed_key).await
    }

    /// Find an item in the live queue or the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_item(&self, id: &str) -> Result<Option<QueueItem>, VitalSyncError> {
        if let Some(item) = self.read_queue().await?.into_iter().find(|i| i.id == id) {
            return Ok(Some(item));
        }
        Ok(self.get_failed_items().await?.into_iter().find(|i| i.id == id))
    }

    /// Replay the queue once, in enqueue order.
    ///
    /// Applier failures never surface here; they are recorded on the items.
    /// A call made while another drain is running returns
    /// [`DrainOutcome::AlreadyRunning`] without doing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; the cycle is abandoned at that point.
    pub async fn process_queue(
        &self,
        applier: &dyn MutationApplier,
    ) -> Result<DrainOutcome, VitalSyncError> {
        let Some(_guard) = ProcessingGuard::acquire(self) else {
            tracing::info!("Queue drain already in progress, skipping");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        let started = Instant::now();
        let timestamp = Utc::now();

        let snapshot = self.read_queue().await?;
        self.notify();

        if snapshot.is_empty() {
            tracing::debug!("Offline queue is empty");
            return Ok(DrainOutcome::Empty);
        }

        tracing::info!(items = snapshot.len(), "Processing offline queue");

        let mut counters = CycleCounters::default();
        for queued in &snapshot {
            let Some(claimed) = self.begin_item(&queued.id).await? else {
                continue;
            };

            let ctx = ApplyContext {
                item_id: claimed.id.clone(),
                attempt: claimed.retry_count.saturating_add(1),
                conflict_resolution: claimed.conflict_resolution,
            };
            let result = apply(applier, &ctx, &claimed.mutation).await;

            let Some((outcome, item)) = self.settle_item(&claimed.id, result).await? else {
                tracing::debug!(id = %claimed.id, "Item changed while in flight, leaving it as is");
                counters.record_superseded();
                continue;
            };

            match outcome {
                ItemOutcome::Synced => tracing::debug!(id = %item.id, "Item synced"),
                ItemOutcome::Retrying => tracing::warn!(
                    id = %item.id,
                    retry_count = item.retry_count,
                    error = item.last_error.as_deref().unwrap_or_default(),
                    "Item failed, will retry"
                ),
                ItemOutcome::Failed => tracing::warn!(
                    id = %item.id,
                    error = item.last_error.as_deref().unwrap_or_default(),
                    "Item failed permanently"
                ),
                ItemOutcome::Conflict(policy) => {
                    tracing::info!(id = %item.id, %policy, "Item conflicted");
                },
            }

            counters.record(outcome);
        }

        self.finish_cycle().await?;

        let entry = SyncHistoryEntry::new(timestamp, counters, started.elapsed());
        self.append_history(entry.clone()).await?;

        tracing::info!(
            processed = entry.items_processed,
            succeeded = entry.items_succeeded,
            failed = entry.items_failed,
            conflicted = entry.items_conflicted,
            duration_ms = entry.duration_ms,
            "Offline queue processed"
        );

        Ok(DrainOutcome::Completed(entry))
    }

    /// Reset an item for another round of attempts.
    ///
    /// Dead-lettered items are moved back to the end of the live queue.
    /// Returns `false` if no item has this ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn retry_item(&self, id: &str) -> Result<bool, VitalSyncError> {
        let found = {
            let _lock = self.write_lock.lock().await;
            let mut queue = self.read_queue().await?;
            let mut failed: Vec<QueueItem> = self.read_list(&self.settings.failed_key).await?;

            let dead = failed
                .iter()
                .position(|i| i.id == id)
                .map(|pos| failed.remove(pos));
            let live = match queue.iter_mut().find(|i| i.id == id) {
                Some(item) => {
                    item.reset_for_retry();
                    true
                },
                None => false,
            };

            match dead {
                Some(mut item) => {
                    // A live copy wins; the dead-lettered one is dropped
                    if !live {
                        item.reset_for_retry();
                        queue.push(item);
                    }
                    self.write_lists(&queue, &failed).await?;
                    true
                },
                None if live => {
                    self.write_queue(&queue).await?;
                    true
                },
                None => false,
            }
        };

        if found {
            tracing::debug!(%id, "Item reset for retry");
            self.notify();
        }
        Ok(found)
    }

    /// Delete an item regardless of status. Returns `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn remove_item(&self, id: &str) -> Result<bool, VitalSyncError> {
        let found = {
            let _lock = self.write_lock.lock().await;
            let mut queue = self.read_queue().await?;
            let mut failed: Vec<QueueItem> = self.read_list(&self.settings.failed_key).await?;

            let (live_before, dead_before) = (queue.len(), failed.len());
            queue.retain(|i| i.id != id);
            failed.retain(|i| i.id != id);

            match (queue.len() != live_before, failed.len() != dead_before) {
                (true, true) => self.write_lists(&queue, &failed).await?,
                (true, false) => self.write_queue(&queue).await?,
                (false, true) => self.write_list(&self.settings.failed_key, &failed).await?,
                (false, false) => {},
            }
            queue.len() != live_before || failed.len() != dead_before
        };

        if found {
            tracing::debug!(%id, "Item removed");
            self.notify();
        }
        Ok(found)
    }

    /// Choose the conflict policy for an item. Returns `false` if not found.
    ///
    /// If the item is already parked in `Conflict`, a non-manual policy is
    /// applied right away.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn set_conflict_resolution(
        &self,
        id: &str,
        policy: ConflictResolution,
    ) -> Result<bool, VitalSyncError> {
        {
            let _lock = self.write_lock.lock().await;
            let mut queue = self.read_queue().await?;

            let Some(item) = queue.iter_mut().find(|i| i.id == id) else {
                return Ok(false);
            };

            item.conflict_resolution = Some(policy);
            if item.status == ItemStatus::Conflict {
                resolve_conflict(item, policy);
            }

            queue.retain(|i| i.status != ItemStatus::Synced);
            self.write_queue(&queue).await?;
        }

        tracing::debug!(%id, %policy, "Conflict resolution set");
        self.notify();
        Ok(true)
    }

    /// Remove every `Synced` item from the live queue. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn clear_synced_items(&self) -> Result<usize, VitalSyncError> {
        let removed = {
            let _lock = self.write_lock.lock().await;
            let mut queue = self.read_queue().await?;
            let before = queue.len();
            queue.retain(|i| i.status != ItemStatus::Synced);
            let removed = before - queue.len();
            if removed > 0 {
                self.write_queue(&queue).await?;
            }
            removed
        };

        if removed > 0 {
            self.notify();
        }
        Ok(removed)
    }

    /// Wipe the live queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear_queue(&self) -> Result<(), VitalSyncError> {
        {
            let _lock = self.write_lock.lock().await;
            self.store.remove(&self.settings.queue_key).await?;
            self.queue_length.store(0, Ordering::SeqCst);
        }

        tracing::info!("Offline queue cleared");
        self.notify();
        Ok(())
    }

    /// Wipe the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear_failed_items(&self) -> Result<(), VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        self.store.remove(&self.settings.failed_key).await
    }

    /// Wipe the sync history.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear_history(&self) -> Result<(), VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        self.store.remove(&self.settings.history_key).await
    }

    /// Count items by status, from a fresh read.
    ///
    /// Dead-lettered items are counted as `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_queue_status(&self) -> Result<QueueStatus, VitalSyncError> {
        let queue = self.read_queue().await?;
        let failed = self.get_failed_items().await?;

        let mut status = QueueStatus::default();
        for item in queue.iter().chain(&failed) {
            status.total += 1;
            match item.status {
                ItemStatus::Pending => status.pending += 1,
                ItemStatus::Syncing => status.syncing += 1,
                ItemStatus::Failed => status.failed += 1,
                ItemStatus::Conflict => status.conflicts += 1,
                // Only visible between a sync and the end of its cycle
                ItemStatus::Synced => {},
            }
        }

        Ok(status)
    }

    /// Get up to `limit` history entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_sync_history(
        &self,
        limit: usize,
    ) -> Result<Vec<SyncHistoryEntry>, VitalSyncError> {
        let history: Vec<SyncHistoryEntry> = self.read_list(&self.settings.history_key).await?;
        Ok(history.into_iter().rev().take(limit).collect())
    }

    /// Mark the stored copy of an item as `Syncing` and return it.
    ///
    /// Returns `None` if the item was removed or is no longer replayable.
    async fn begin_item(&self, id: &str) -> Result<Option<QueueItem>, VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        let mut queue = self.read_queue().await?;

        let Some(item) = queue.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if !item.status.is_replayable() {
            return Ok(None);
        }

        item.status = ItemStatus::Syncing;
        item.last_attempt_at = Some(Utc::now());
        let claimed = item.clone();
        self.write_queue(&queue).await?;

        Ok(Some(claimed))
    }

    /// Apply an applier result to the stored copy of an item.
    ///
    /// The stored copy carries any policy chosen while the applier ran.
    /// Returns `None`, writing nothing, if the item was removed or reset
    /// (no longer `Syncing`) in the meantime.
    async fn settle_item(
        &self,
        id: &str,
        result: ApplyResult,
    ) -> Result<Option<(ItemOutcome, QueueItem)>, VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        let mut queue = self.read_queue().await?;

        let Some(item) = queue.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if item.status != ItemStatus::Syncing {
            return Ok(None);
        }

        let outcome = settle(item, result, self.settings.max_retries);
        let settled = item.clone();
        self.write_queue(&queue).await?;

        Ok(Some((outcome, settled)))
    }

    /// Drop synced items and move failed ones to the dead-letter list.
    async fn finish_cycle(&self) -> Result<(), VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        let queue = self.read_queue().await?;

        let mut retained = Vec::with_capacity(queue.len());
        let mut exhausted = Vec::new();
        for item in queue {
            match item.status {
                ItemStatus::Synced => {},
                ItemStatus::Failed => exhausted.push(item),
                ItemStatus::Pending | ItemStatus::Syncing | ItemStatus::Conflict => {
                    retained.push(item);
                },
            }
        }

        if exhausted.is_empty() {
            return self.write_queue(&retained).await;
        }

        let mut failed: Vec<QueueItem> = self.read_list(&self.settings.failed_key).await?;
        // One record per id: the newer copy replaces any stale dead letter
        failed.retain(|dead| exhausted.iter().all(|item| item.id != dead.id));
        failed.extend(exhausted);

        self.write_lists(&retained, &failed).await
    }

    async fn append_history(&self, entry: SyncHistoryEntry) -> Result<(), VitalSyncError> {
        let _lock = self.write_lock.lock().await;
        let mut history: Vec<SyncHistoryEntry> = self.read_list(&self.settings.history_key).await?;
        push_capped(&mut history, entry, self.settings.history_limit);
        self.write_list(&self.settings.history_key, &history).await
    }

    async fn read_queue(&self) -> Result<Vec<QueueItem>, VitalSyncError> {
        let queue: Vec<QueueItem> = self.read_list(&self.settings.queue_key).await?;
        self.queue_length.store(queue.len(), Ordering::SeqCst);
        Ok(queue)
    }

    async fn write_queue(&self, queue: &[QueueItem]) -> Result<(), VitalSyncError> {
        self.write_list(&self.settings.queue_key, queue).await?;
        self.queue_length.store(queue.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, VitalSyncError> {
        match self.store.get(key).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn write_list<T: Serialize + Sync>(
        &self,
        key: &str,
        items: &[T],
    ) -> Result<(), VitalSyncError> {
        let raw = serde_json::to_string(items)?;
        self.store.set(key, &raw).await
    }

    /// Rewrite the live queue and the dead-letter list in one store write.
    async fn write_lists(
        &self,
        queue: &[QueueItem],
        failed: &[QueueItem],
    ) -> Result<(), VitalSyncError> {
        let queue_raw = serde_json::to_string(queue)?;
        let failed_raw = serde_json::to_string(failed)?;

        self.store
            .set_many(&[
                (self.settings.queue_key.as_str(), queue_raw.as_str()),
                (self.settings.failed_key.as_str(), failed_raw.as_str()),
            ])
            .await?;

        self.queue_length.store(queue.len(), Ordering::SeqCst);
        Ok(())
    }

    fn notify(&self) {
        self.observers.notify(QueueSnapshot {
            is_processing: self.is_processing(),
            queue_length: self.queue_length.load(Ordering::SeqCst),
        });
    }
}

/// Holds the in-progress flag for the duration of a drain.
///
/// Dropping the guard clears the flag and notifies observers, including when
/// the drain returns early with an error or unwinds.
struct ProcessingGuard<'a> {
    engine: &'a QueueEngine,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(engine: &'a QueueEngine) -> Option<Self> {
        engine
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { engine })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.engine.processing.store(false, Ordering::SeqCst);
        self.engine.notify();
    }
}

/// Apply an applier result to an item and classify the outcome.
fn settle(item: &mut QueueItem, result: ApplyResult, max_retries: u32) -> ItemOutcome {
    let error = match result {
        Ok(()) => {
            item.status = ItemStatus::Synced;
            return ItemOutcome::Synced;
        },
        Err(error) => error,
    };

    item.retry_count = item.retry_count.saturating_add(1);
    item.last_error = Some(error.to_string());

    match error {
        ApplyError::Conflict(_) => {
            item.status = ItemStatus::Conflict;
            let policy = *item
                .conflict_resolution
                .get_or_insert(ConflictResolution::ServerWins);
            resolve_conflict(item, policy);
            ItemOutcome::Conflict(policy)
        },
        ApplyError::Retryable(_) if item.retry_count >= max_retries => {
            item.status = ItemStatus::Failed;
            ItemOutcome::Failed
        },
        ApplyError::Retryable(_) => {
            item.status = ItemStatus::Pending;
            ItemOutcome::Retrying
        },
    }
}

/// Move a conflicting item according to `policy`.
fn resolve_conflict(item: &mut QueueItem, policy: ConflictResolution) {
    match policy {
        ConflictResolution::ServerWins => item.status = ItemStatus::Synced,
        ConflictResolution::ClientWins => {
            item.retry_count = 0;
            item.status = ItemStatus::Pending;
        },
        ConflictResolution::Manual => item.status = ItemStatus::Conflict,
    }
}
