//! Output formatting for vitalsync.
//!
//! This module provides formatters for displaying queue data in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::VitalSyncError;
use crate::sync::{QueueItem, QueueStatus, SyncHistoryEntry};

pub use json::*;
pub use pretty::*;

/// Format queue items based on output format
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_items(
    items: &[QueueItem],
    title: &str,
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_items_pretty(items, title)),
        OutputFormat::Json => format_items_json(items, title),
    }
}

/// Format a single queue item based on output format
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_item(item: &QueueItem, format: OutputFormat) -> Result<String, VitalSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_item_pretty(item)),
        OutputFormat::Json => to_json(item),
    }
}

/// Format queue counts based on output format
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_status(status: &QueueStatus, format: OutputFormat) -> Result<String, VitalSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(status)),
        OutputFormat::Json => to_json(status),
    }
}

/// Format sync history based on output format
///
/// # Errors
///
/// Returns `VitalSyncError::Parse` if JSON serialization fails.
pub fn format_history(
    entries: &[SyncHistoryEntry],
    format: OutputFormat,
) -> Result<String, VitalSyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_history_pretty(entries)),
        OutputFormat::Json => format_history_json(entries),
    }
}
