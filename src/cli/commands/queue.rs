//! Offline queue command implementation.
//!
//! Handles queue inspection and maintenance commands. None of these replay
//! mutations; that needs an applier and is left to the host application.

use colored::Colorize;

use crate::cli::args::{AddArgs, ClearArgs, ListArgs, OutputFormat};
use crate::error::VitalSyncError;
use crate::output::{format_history, format_item, format_items, format_status, to_json};
use crate::sync::{ConflictResolution, Mutation, QueueEngine};

/// Show queue counts.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn status(engine: &QueueEngine, format: OutputFormat) -> Result<String, VitalSyncError> {
    let status = engine.get_queue_status().await?;
    format_status(&status, format)
}

/// List the live queue or the dead-letter list.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list(
    engine: &QueueEngine,
    args: &ListArgs,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    let (mut items, title) = if args.failed {
        (engine.get_failed_items().await?, "Failed Items")
    } else {
        (engine.get_queue().await?, "Offline Queue")
    };

    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    format_items(&items, title, format)
}

/// Show recent sync cycles.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn history(
    engine: &QueueEngine,
    limit: usize,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    let entries = engine.get_sync_history(limit).await?;
    format_history(&entries, format)
}

/// Queue a mutation from a JSON payload.
///
/// # Errors
///
/// Returns an error if the payload does not match the kind, or the store fails.
pub async fn add(
    engine: &QueueEngine,
    args: AddArgs,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    let mutation = Mutation::from_json(args.kind, &args.payload)?;
    let id = engine.enqueue(mutation).await?;
    let item = engine
        .get_item(&id)
        .await?
        .ok_or_else(|| VitalSyncError::NotFound(format!("Item {id}")))?;

    match format {
        OutputFormat::Json => format_item(&item, format),
        OutputFormat::Pretty => Ok(format!(
            "{} Queued {} (ID: {})",
            "✓".green(),
            item.kind().display_name(),
            id
        )),
    }
}

/// Reset an item for retry.
///
/// # Errors
///
/// Returns `NotFound` if no item has this ID.
pub async fn retry(
    engine: &QueueEngine,
    id: &str,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    if !engine.retry_item(id).await? {
        return Err(VitalSyncError::NotFound(format!("Item {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({"retried": id})),
        OutputFormat::Pretty => Ok(format!("Reset item {id} for retry")),
    }
}

/// Remove an item.
///
/// # Errors
///
/// Returns `NotFound` if no item has this ID.
pub async fn remove(
    engine: &QueueEngine,
    id: &str,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    if !engine.remove_item(id).await? {
        return Err(VitalSyncError::NotFound(format!("Item {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({"removed": id})),
        OutputFormat::Pretty => Ok(format!("Removed item {id}")),
    }
}

/// Set the conflict policy for an item.
///
/// # Errors
///
/// Returns `NotFound` if the live queue has no item with this ID.
pub async fn resolve(
    engine: &QueueEngine,
    id: &str,
    policy: ConflictResolution,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    if !engine.set_conflict_resolution(id, policy).await? {
        return Err(VitalSyncError::NotFound(format!("Item {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({"id": id, "policy": policy})),
        OutputFormat::Pretty => Ok(format!("Set conflict policy for {id} to {policy}")),
    }
}

/// Clear stored data.
///
/// # Errors
///
/// Returns an error if `--all` is given without `--force`, or the store fails.
pub async fn clear(
    engine: &QueueEngine,
    args: &ClearArgs,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    if args.all {
        if !args.force {
            return Err(VitalSyncError::InvalidInput(
                "Use --force to clear everything".to_string(),
            ));
        }
        engine.clear_queue().await?;
        engine.clear_failed_items().await?;
        engine.clear_history().await?;

        return match format {
            OutputFormat::Json => to_json(&serde_json::json!({"cleared": "all"})),
            OutputFormat::Pretty => Ok("Cleared queue, failed items and history".to_string()),
        };
    }

    let mut cleared = Vec::new();

    // No flags means the routine cleanup
    if args.synced || !(args.failed || args.history) {
        let count = engine.clear_synced_items().await?;
        cleared.push(format!("{count} synced items"));
    }
    if args.failed {
        engine.clear_failed_items().await?;
        cleared.push("failed items".to_string());
    }
    if args.history {
        engine.clear_history().await?;
        cleared.push("sync history".to_string());
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({"cleared": cleared})),
        OutputFormat::Pretty => Ok(format!("Cleared {}", cleared.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStore;
    use crate::sync::{MutationKind, QueueSettings};

    fn create_test_engine() -> QueueEngine {
        QueueEngine::new(Arc::new(MemoryStore::new()), QueueSettings::default())
    }

    fn add_args(payload: &str) -> AddArgs {
        AddArgs {
            kind: MutationKind::ProfileUpdate,
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_then_list_json() {
        let engine = create_test_engine();
        add(&engine, add_args(r#"{"user_id":"U-1"}"#), OutputFormat::Pretty)
            .await
            .unwrap();

        let args = ListArgs {
            failed: false,
            limit: None,
        };
        let json = list(&engine, &args, OutputFormat::Json).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["count"], 1);
        assert_eq!(parsed["items"][0]["mutation"]["payload"]["user_id"], "U-1");
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_payload() {
        let engine = create_test_engine();
        let result = add(&engine, add_args(r#"{"name":"no id"}"#), OutputFormat::Pretty).await;
        assert!(matches!(result, Err(VitalSyncError::InvalidInput(_))));
        assert!(engine.get_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_unknown_item() {
        let engine = create_test_engine();
        let result = retry(&engine, "missing", OutputFormat::Pretty).await;
        assert!(matches!(result, Err(VitalSyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_all_requires_force() {
        let engine = create_test_engine();
        let args = ClearArgs {
            synced: false,
            failed: false,
            history: false,
            all: true,
            force: false,
        };
        assert!(clear(&engine, &args, OutputFormat::Pretty).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_defaults_to_synced() {
        let engine = create_test_engine();
        let args = ClearArgs {
            synced: false,
            failed: false,
            history: false,
            all: false,
            force: false,
        };
        let output = clear(&engine, &args, OutputFormat::Pretty).await.unwrap();
        assert_eq!(output, "Cleared 0 synced items");
    }
}
