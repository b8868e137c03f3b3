use colored::Colorize;

use crate::sync::{ItemStatus, QueueItem, QueueStatus, SyncHistoryEntry};

const MAX_ERROR_WIDTH: usize = 50;

fn status_icon(status: ItemStatus) -> String {
    match status {
        ItemStatus::Pending => "[ ]".white().to_string(),
        ItemStatus::Syncing => "[>]".cyan().to_string(),
        ItemStatus::Synced => "[x]".green().to_string(),
        ItemStatus::Failed => "[!]".red().to_string(),
        ItemStatus::Conflict => "[~]".yellow().to_string(),
    }
}

fn shorten(text: &str) -> String {
    if text.chars().count() > MAX_ERROR_WIDTH {
        let head: String = text.chars().take(MAX_ERROR_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Format a list of queue items as a pretty table
pub fn format_items_pretty(items: &[QueueItem], title: &str) -> String {
    if items.is_empty() {
        return format!("{title} (0 items)\n  No items");
    }

    let mut output = format!("{title} ({} items)\n", items.len());
    output.push_str(&"─".repeat(72));
    output.push('\n');

    for item in items {
        output.push_str(&format!(
            "{} {:<24} {:<18} {}",
            status_icon(item.status),
            item.id.dimmed(),
            item.kind().display_name().bold(),
            item.mutation.target_id()
        ));

        if item.retry_count > 0 {
            let retries = format!("retries: {}", item.retry_count);
            output.push_str(&format!("  {}", retries.yellow()));
        }
        if let Some(policy) = item.conflict_resolution {
            output.push_str(&format!("  {}", policy.to_string().cyan()));
        }
        output.push('\n');

        if let Some(error) = &item.last_error {
            output.push_str(&format!("    {}\n", shorten(error).red()));
        }
    }

    output
}

/// Format a single queue item as pretty output
pub fn format_item_pretty(item: &QueueItem) -> String {
    let mut output = format!(
        "{} {}\n",
        status_icon(item.status),
        item.kind().display_name().bold()
    );
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), item.id));
    output.push_str(&format!("  {}: {}\n", "Status".dimmed(), item.status));
    output.push_str(&format!(
        "  {}: {}\n",
        "Target".dimmed(),
        item.mutation.target_id()
    ));
    output.push_str(&format!(
        "  {}: {}\n",
        "Created".dimmed(),
        item.created_at.format("%Y-%m-%d %H:%M")
    ));

    if item.retry_count > 0 {
        output.push_str(&format!("  {}: {}\n", "Retries".dimmed(), item.retry_count));
    }

    if let Some(policy) = item.conflict_resolution {
        output.push_str(&format!("  {}: {}\n", "Conflict policy".dimmed(), policy));
    }

    output
}

/// Format queue counts as pretty output
pub fn format_status_pretty(status: &QueueStatus) -> String {
    let mut lines = Vec::new();

    lines.push("Offline Queue Status".bold().to_string());
    lines.push("─".repeat(40));
    lines.push(format!("  Total:      {}", status.total));
    lines.push(format!(
        "  Pending:    {} {}",
        status.pending,
        if status.pending > 0 {
            "waiting for connectivity".dimmed()
        } else {
            "".dimmed()
        }
    ));
    lines.push(format!("  Syncing:    {}", status.syncing));
    lines.push(format!(
        "  Failed:     {} {}",
        status.failed,
        if status.failed > 0 {
            "need attention".red()
        } else {
            "".normal()
        }
    ));
    lines.push(format!(
        "  Conflicts:  {} {}",
        status.conflicts,
        if status.conflicts > 0 {
            "awaiting resolution".yellow()
        } else {
            "".normal()
        }
    ));

    if status.failed > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'vitalsync list --failed' to inspect failed items"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format sync history as pretty output
pub fn format_history_pretty(entries: &[SyncHistoryEntry]) -> String {
    if entries.is_empty() {
        return "Sync History (0)\n  No sync cycles recorded".to_string();
    }

    let mut output = format!("Sync History ({})\n", entries.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "{:<18} {:>9} {:>9} {:>7} {:>9} {:>8}\n",
        "When", "Processed", "Succeeded", "Failed", "Conflicts", "Duration"
    ));

    for entry in entries {
        let failed = if entry.items_failed > 0 {
            entry.items_failed.to_string().red()
        } else {
            entry.items_failed.to_string().normal()
        };
        output.push_str(&format!(
            "{:<18} {:>9} {:>9} {:>7} {:>9} {:>6}ms\n",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.items_processed,
            entry.items_succeeded.to_string().green(),
            failed,
            entry.items_conflicted,
            entry.duration_ms
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Mutation, VitalReading};

    fn make_item() -> QueueItem {
        QueueItem::new(Mutation::VitalUpload(VitalReading {
            student_id: "S-42".to_string(),
            device_id: None,
            heart_rate: Some(180),
            temperature_c: None,
            spo2: None,
            systolic: None,
            diastolic: None,
            respiratory_rate: None,
            recorded_at: None,
        }))
    }

    #[test]
    fn test_format_items_empty() {
        let output = format_items_pretty(&[], "Offline Queue");
        assert!(output.contains("Offline Queue (0 items)"));
        assert!(output.contains("No items"));
    }

    #[test]
    fn test_format_items_shows_target_and_error() {
        let mut item = make_item();
        item.retry_count = 2;
        item.last_error = Some("x".repeat(80));

        let output = format_items_pretty(&[item], "Offline Queue");

        assert!(output.contains("Vital Upload"));
        assert!(output.contains("S-42"));
        assert!(output.contains("retries: 2"));
        assert!(output.contains(&format!("{}...", "x".repeat(47))));
        assert!(!output.contains(&"x".repeat(48)));
    }

    #[test]
    fn test_format_status_mentions_failures() {
        let status = QueueStatus {
            total: 3,
            pending: 1,
            syncing: 0,
            failed: 2,
            conflicts: 0,
        };
        let output = format_status_pretty(&status);
        assert!(output.contains("Offline Queue Status"));
        assert!(output.contains("list --failed"));
    }

    #[test]
    fn test_format_item_lists_fields_line_by_line() {
        let mut item = make_item();
        item.retry_count = 1;

        let output = format_item_pretty(&item);
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains(&item.id));
        assert!(lines[3].contains("S-42"));
        assert!(lines[5].ends_with('1'));
    }

    #[test]
    fn test_format_history_one_row_per_entry() {
        let entry = SyncHistoryEntry::new(
            chrono::Utc::now(),
            crate::sync::CycleCounters::default(),
            std::time::Duration::from_millis(7),
        );

        let output = format_history_pretty(&[entry.clone(), entry]);

        assert_eq!(output.lines().count(), 5);
        assert!(output.contains("7ms"));
    }

    #[test]
    fn test_format_history_empty() {
        assert!(format_history_pretty(&[]).contains("No sync cycles recorded"));
    }
}
