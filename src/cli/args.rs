use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::sync::{ConflictResolution, MutationKind};

#[derive(Parser)]
#[command(name = "vitalsync")]
#[command(about = "Inspect and maintain the offline mutation queue")]
#[command(long_about = "vitalsync - offline mutation queue maintenance

Inspects the durable queue of mutations recorded while a device was offline,
along with the dead-letter list and sync history. Replay is driven by the
host application; this tool only reads and edits the stored queue.

QUICK START:
  vitalsync status                  Show queue counts
  vitalsync list                    List queued mutations
  vitalsync list --failed           List dead-lettered mutations
  vitalsync retry <ID>              Reset an item for another round
  vitalsync history -n 5            Show the last five sync cycles

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to `general.default_output` from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Data directory holding config.yaml and the queue database
    #[arg(long, env = "VITALSYNC_HOME", global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show queue counts by status
    ///
    /// Counts cover the live queue and the dead-letter list.
    #[command(alias = "st")]
    Status,

    /// List queued mutations
    ///
    /// # Examples
    ///
    ///   vitalsync list              Live queue, oldest first
    ///   vitalsync list --failed     Dead-lettered items
    ///   vitalsync ls -n 5 -o json   First five items as JSON
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show recent sync cycles, newest first
    History {
        /// Maximum entries to show
        #[arg(long, short = 'n', default_value = "10")]
        limit: usize,
    },

    /// Queue a mutation
    ///
    /// # Examples
    ///
    ///   vitalsync add vital-upload --payload '{"student_id":"S-1","heart_rate":72}'
    ///   vitalsync add profile-update --payload '{"user_id":"U-1","name":"Ada"}'
    Add(AddArgs),

    /// Reset an item for another round of attempts
    ///
    /// Dead-lettered items are moved back to the live queue.
    Retry {
        /// Item ID
        id: String,
    },

    /// Delete an item from the queue or the dead-letter list
    #[command(alias = "rm")]
    Remove {
        /// Item ID
        id: String,
    },

    /// Choose how a conflict on an item is settled
    ///
    /// An item already parked in conflict is settled immediately.
    Resolve {
        /// Item ID
        id: String,

        /// Policy (server-wins, client-wins, manual)
        #[arg(value_parser = parse_resolution)]
        policy: ConflictResolution,
    },

    /// Clear stored data
    ///
    /// Without flags, removes synced items from the live queue.
    Clear(ClearArgs),
}

/// Arguments for `list`.
#[derive(Args)]
pub struct ListArgs {
    /// Show the dead-letter list instead of the live queue
    #[arg(long)]
    pub failed: bool,

    /// Maximum items to show
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Arguments for `add`.
#[derive(Args)]
pub struct AddArgs {
    /// Mutation kind (vital-upload, profile-update, alert-acknowledge,
    /// device-register, student-create, student-update)
    #[arg(value_parser = parse_kind)]
    pub kind: MutationKind,

    /// Payload as JSON
    #[arg(long, short = 'p')]
    pub payload: String,
}

/// Arguments for `clear`.
#[derive(Args)]
pub struct ClearArgs {
    /// Remove synced items from the live queue
    #[arg(long)]
    pub synced: bool,

    /// Empty the dead-letter list
    #[arg(long)]
    pub failed: bool,

    /// Empty the sync history
    #[arg(long)]
    pub history: bool,

    /// Empty the live queue, dead-letter list and history
    #[arg(long, conflicts_with_all = ["synced", "failed", "history"])]
    pub all: bool,

    /// Skip confirmation
    #[arg(long, short = 'f')]
    pub force: bool,
}

fn parse_kind(s: &str) -> Result<MutationKind, String> {
    s.parse().map_err(|e: crate::error::VitalSyncError| e.to_string())
}

fn parse_resolution(s: &str) -> Result<ConflictResolution, String> {
    s.parse().map_err(|e: crate::error::VitalSyncError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_status_command() {
        let cli = Cli::try_parse_from(["vitalsync", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_list_alias() {
        let cli = Cli::try_parse_from(["vitalsync", "ls", "--failed", "-n", "3"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                assert!(args.failed);
                assert_eq!(args.limit, Some(3));
            },
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_output_format_unset() {
        let cli = Cli::try_parse_from(["vitalsync", "status"]).unwrap();
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_cli_output_format_short() {
        let cli = Cli::try_parse_from(["vitalsync", "status", "-o", "json"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_cli_home_flag() {
        let cli = Cli::try_parse_from(["vitalsync", "--home", "/tmp/vs", "status"]).unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/vs")));
    }

    #[test]
    fn test_cli_add_parses_kind() {
        let cli = Cli::try_parse_from([
            "vitalsync",
            "add",
            "vital-upload",
            "--payload",
            r#"{"student_id":"S-1"}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.kind, MutationKind::VitalUpload);
                assert_eq!(args.payload, r#"{"student_id":"S-1"}"#);
            },
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_cli_add_rejects_unknown_kind() {
        let result = Cli::try_parse_from(["vitalsync", "add", "teleport", "--payload", "{}"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_resolve_policy() {
        let cli = Cli::try_parse_from(["vitalsync", "resolve", "abc", "client-wins"]).unwrap();
        match cli.command {
            Commands::Resolve { id, policy } => {
                assert_eq!(id, "abc");
                assert_eq!(policy, ConflictResolution::ClientWins);
            },
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_cli_clear_all_conflicts_with_others() {
        let result = Cli::try_parse_from(["vitalsync", "clear", "--all", "--synced"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_history_default_limit() {
        let cli = Cli::try_parse_from(["vitalsync", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 10 }));
    }
}
