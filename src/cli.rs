// ABOUTME: Command-line definition for the intray binary using clap derive.
// ABOUTME: Arguments are parsed into core types here so handlers receive pre-validated values.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use intray_core::{GroupBy, Level, ReadFilter, SortField, SortOrder, StateFilter};

#[derive(Parser)]
#[command(
    name = "intray",
    version,
    about = "Persistent notification inbox addressed by tmux session, window and pane"
)]
pub struct Cli {
    /// State directory (default: INTRAY_STATE_DIR, then $XDG_STATE_HOME/tmux-intray)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(flatten)]
    Store(StoreCommand),
    /// Migrate the TSV store to SQLite, or roll a migration back
    Migrate(MigrateOpts),
}

/// Subcommands that run against the configured store.
#[derive(Subcommand)]
pub enum StoreCommand {
    /// Add a notification and print its id
    Add(AddOpts),
    /// List notifications, unread first
    List(ListOpts),
    /// Print one notification
    Get { id: u64 },
    /// Dismiss a notification
    Dismiss { id: u64 },
    /// Dismiss every active notification
    DismissAll,
    /// Mark a notification as read
    MarkRead { id: u64 },
    /// Mark a notification as unread
    MarkUnread { id: u64 },
    /// Delete dismissed notifications older than a number of days
    Cleanup(CleanupOpts),
    /// Print the number of active notifications
    Count,
}

#[derive(Args)]
pub struct AddOpts {
    pub message: String,

    #[arg(long)]
    pub session: Option<String>,

    #[arg(long)]
    pub window: Option<String>,

    #[arg(long)]
    pub pane: Option<String>,

    /// Pane creation time as reported by tmux
    #[arg(long)]
    pub pane_created: Option<String>,

    /// info, warning, error or critical
    #[arg(long, default_value = "info")]
    pub level: Level,
}

#[derive(Args)]
pub struct ListOpts {
    /// active, dismissed or all
    #[arg(long, default_value = "active")]
    pub state: StateFilter,

    #[arg(long)]
    pub level: Option<Level>,

    #[arg(long)]
    pub session: Option<String>,

    #[arg(long)]
    pub window: Option<String>,

    #[arg(long)]
    pub pane: Option<String>,

    /// Only notifications created more than this many days ago
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u32>,

    /// Only notifications created within this many days
    #[arg(long, value_name = "DAYS")]
    pub newer_than: Option<u32>,

    /// read or unread
    #[arg(long)]
    pub read_status: Option<ReadFilter>,

    /// Substring to look for in message and pane address
    #[arg(long)]
    pub search: Option<String>,

    /// Treat --search as a regular expression
    #[arg(long, requires = "search", conflicts_with = "tokens")]
    pub regex: bool,

    /// Treat --search as whitespace-separated tokens that must all match
    #[arg(long, requires = "search")]
    pub tokens: bool,

    #[arg(long)]
    pub case_insensitive: bool,

    /// id, timestamp, level, session, message or read_status
    #[arg(long)]
    pub sort_by: Option<SortField>,

    #[arg(long, default_value = "asc")]
    pub sort_order: SortOrder,

    /// session, window, pane or level
    #[arg(long)]
    pub group_by: Option<GroupBy>,

    /// With --group-by, print group counts without members
    #[arg(long, requires = "group_by")]
    pub count_only: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanupOpts {
    /// Age threshold in days (default: INTRAY_AUTO_CLEANUP_DAYS)
    #[arg(long)]
    pub days: Option<u32>,

    /// Report what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct MigrateOpts {
    /// Source TSV file (default: <state-dir>/notifications.tsv)
    #[arg(long)]
    pub tsv_path: Option<PathBuf>,

    /// Destination database (default: <state-dir>/notifications.db)
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// Backup location (default: <tsv-path>.sqlite-migration.bak)
    #[arg(long)]
    pub backup_path: Option<PathBuf>,

    /// Validate and report without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Restore the TSV file from the backup and remove the database
    #[arg(long, conflicts_with = "dry_run")]
    pub rollback: bool,

    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn migrate_rejects_dry_run_with_rollback() {
        let result = Cli::try_parse_from(["intray", "migrate", "--dry-run", "--rollback"]);
        assert!(result.is_err());
    }

    #[test]
    fn list_parses_core_types() {
        let cli = Cli::try_parse_from([
            "intray",
            "list",
            "--state",
            "all",
            "--level",
            "warning",
            "--group-by",
            "session",
            "--count-only",
        ])
        .unwrap();
        match cli.command {
            Command::Store(StoreCommand::List(opts)) => {
                assert_eq!(opts.state, StateFilter::All);
                assert_eq!(opts.level, Some(Level::Warning));
                assert_eq!(opts.group_by, Some(GroupBy::Session));
                assert!(opts.count_only);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn list_rejects_unknown_group_by() {
        assert!(Cli::try_parse_from(["intray", "list", "--group-by", "colour"]).is_err());
    }

    #[test]
    fn migrate_and_store_commands_parse_to_separate_branches() {
        let cli = Cli::try_parse_from(["intray", "migrate", "--rollback"]).unwrap();
        assert!(matches!(cli.command, Command::Migrate(ref opts) if opts.rollback));

        let cli = Cli::try_parse_from(["intray", "count"]).unwrap();
        assert!(matches!(cli.command, Command::Store(StoreCommand::Count)));
    }
}
