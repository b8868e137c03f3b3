//! Status observers notified when the queue changes or a drain starts/stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// What observers are told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub is_processing: bool,
    pub queue_length: usize,
}

/// Handle returned by `add_listener`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered callback.
pub type Listener = Arc<dyn Fn(QueueSnapshot) + Send + Sync>;

/// Registry of listeners.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Observers {
    /// Register a listener.
    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Call every listener with `snapshot`.
    pub fn notify(&self, snapshot: QueueSnapshot) {
        // Callbacks run outside the lock so they may (un)register listeners
        let listeners: Vec<Listener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        // A panicking listener cannot leave the list half-updated
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
