//! JSON output formatting for vitalsync.

use serde::Serialize;
use serde_json::json;

use crate::error::VitalSyncError;
use crate::sync::{QueueItem, SyncHistoryEntry};

/// Format queue items as JSON
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_items_json(items: &[QueueItem], list_name: &str) -> Result<String, VitalSyncError> {
    let output = json!({
        "list": list_name,
        "count": items.len(),
        "items": items
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format sync history as JSON
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_history_json(entries: &[SyncHistoryEntry]) -> Result<String, VitalSyncError> {
    let output = json!({
        "count": entries.len(),
        "entries": entries
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, VitalSyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}
