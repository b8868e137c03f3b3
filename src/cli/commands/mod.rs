//! Command implementations for vitalsync.

mod queue;

pub use queue::{add, clear, history, list, remove, resolve, retry, status};
