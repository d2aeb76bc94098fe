//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use dt_core::ProjectPhase;

/// Developer activity tracker.
///
/// Records work sessions, tool invocations and git commits from editor and
/// shell hooks, and reports hours, commit velocity and estimated savings.
#[derive(Debug, Parser)]
#[command(name = "dt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit one raw JSON event (read from stdin when --event is omitted).
    Ingest {
        /// The event as JSON.
        #[arg(long)]
        event: Option<String>,
    },

    /// Record a work session boundary.
    #[command(subcommand)]
    Session(SessionAction),

    /// Record a tool invocation boundary.
    #[command(subcommand)]
    Tool(ToolAction),

    /// Record a git commit.
    Commit(CommitArgs),

    /// Link a repository to a project.
    Link {
        /// Repository path.
        #[arg(long)]
        repo: String,

        /// Key of the project in the external tracker.
        #[arg(long)]
        project: String,

        /// Display name (defaults to the repository directory name).
        #[arg(long)]
        name: Option<String>,

        /// Project phase.
        #[arg(long, default_value = "development")]
        phase: ProjectPhase,
    },

    /// List repository to project links.
    Projects {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show development stats for a date range.
    Stats {
        #[command(flatten)]
        range: RangeArgs,

        /// Only include this repository.
        #[arg(long)]
        repo: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show recent commits with the gap since the previous commit.
    Commits {
        /// Only include this repository.
        #[arg(long)]
        repo: Option<String>,

        /// Maximum number of commits.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Estimate time and cost saved.
    Roi {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export daily summaries as CSV for accounting.
    Export {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Inspect and acknowledge commits awaiting project-tracker delivery.
    #[command(subcommand)]
    Sync(SyncAction),

    /// Show current tracking status.
    Status,

    /// Recompute all daily summaries from stored sessions and commits.
    Rebuild,
}

/// Session boundary events.
#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// A work session started.
    Start {
        /// Repository path.
        #[arg(long)]
        repo: String,

        /// Explicit session id (derived from repository and day when omitted).
        #[arg(long)]
        session: Option<String>,

        /// When it happened (RFC 3339 or relative, e.g. "5 minutes ago").
        #[arg(long)]
        at: Option<String>,
    },

    /// A work session ended.
    End {
        /// Repository path; identifies today's session when --session is omitted.
        #[arg(long, required_unless_present = "session")]
        repo: Option<String>,

        /// Explicit session id.
        #[arg(long)]
        session: Option<String>,

        /// Tool calls the hook counted during the session.
        #[arg(long, default_value_t = 0)]
        tool_calls: i64,

        /// When it happened (RFC 3339 or relative).
        #[arg(long)]
        at: Option<String>,
    },
}

/// Tool invocation events.
#[derive(Debug, Subcommand)]
pub enum ToolAction {
    /// A tool invocation started.
    Start(ToolArgs),

    /// A tool invocation finished.
    End {
        #[command(flatten)]
        tool: ToolArgs,

        /// Exit code of the tool.
        #[arg(long)]
        exit_code: Option<i32>,
    },
}

#[derive(Debug, Args)]
pub struct ToolArgs {
    /// Repository path.
    #[arg(long)]
    pub repo: String,

    /// Tool name (e.g., Bash, Edit).
    #[arg(long)]
    pub tool: String,

    /// Explicit session id.
    #[arg(long)]
    pub session: Option<String>,

    /// When it happened (RFC 3339 or relative).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Repository path.
    #[arg(long)]
    pub repo: String,

    /// Commit hash.
    #[arg(long)]
    pub hash: String,

    /// Commit message.
    #[arg(long, default_value = "")]
    pub message: String,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub insertions: i64,

    #[arg(long, default_value_t = 0)]
    pub deletions: i64,

    #[arg(long, default_value_t = 0)]
    pub files_changed: i64,

    /// Explicit session id.
    #[arg(long)]
    pub session: Option<String>,

    /// Commit time (RFC 3339 or relative).
    #[arg(long)]
    pub at: Option<String>,
}

/// Project-sync queue actions.
#[derive(Debug, Subcommand)]
pub enum SyncAction {
    /// List linked commits not yet delivered.
    Pending {
        /// Maximum number of commits.
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Acknowledge delivery of a commit.
    MarkPushed {
        /// Commit hash.
        hash: String,
    },
}

/// Date range selection shared by reporting commands.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// Number of days back from today (UTC).
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub days: Option<u32>,

    /// First day of the range (YYYY-MM-DD).
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day of the range, inclusive (YYYY-MM-DD).
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
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
    fn session_end_needs_repo_or_session() {
        assert!(Cli::try_parse_from(["dt", "session", "end"]).is_err());
        assert!(Cli::try_parse_from(["dt", "session", "end", "--session", "s-1"]).is_ok());
    }

    #[test]
    fn range_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["dt", "stats", "--days", "3", "--from", "2025-03-01"]).is_err());
        assert!(Cli::try_parse_from(["dt", "stats", "--from", "2025-03-01"]).is_err());

        let cli = Cli::try_parse_from([
            "dt",
            "stats",
            "--from",
            "2025-03-01",
            "--to",
            "2025-03-10",
        ])
        .unwrap();
        let Some(Commands::Stats { range, .. }) = cli.command else {
            panic!("expected stats command");
        };
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn link_parses_phase() {
        let cli = Cli::try_parse_from([
            "dt", "link", "--repo", "/work/api", "--project", "p-1", "--phase", "beta",
        ])
        .unwrap();
        let Some(Commands::Link { phase, .. }) = cli.command else {
            panic!("expected link command");
        };
        assert_eq!(phase, ProjectPhase::Beta);
    }
}
