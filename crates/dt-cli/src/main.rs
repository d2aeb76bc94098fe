use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dt_cli::commands::{
    commit, commits, export, ingest, projects, rebuild, roi, session, stats, status, sync, tool,
    util::resolve_range,
};
use dt_cli::{Cli, Commands, Config, SessionAction, SyncAction, ToolAction};
use dt_db::Database;

const STATS_DEFAULT_DAYS: u32 = 7;
const REPORT_DEFAULT_DAYS: u32 = 30;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr; stdout carries command output for hooks and pipes.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let mut out = std::io::stdout().lock();
    let today = Utc::now().date_naive();

    match command {
        Commands::Ingest { event } => {
            ingest::run(&mut out, &mut db, event.as_deref(), std::io::stdin().lock())?;
        }
        Commands::Session(action) => match action {
            SessionAction::Start {
                repo,
                session: id,
                at,
            } => {
                session::start(&mut out, &mut db, repo, id.as_deref(), at.as_deref())?;
            }
            SessionAction::End {
                repo,
                session: id,
                tool_calls,
                at,
            } => {
                session::end(
                    &mut out,
                    &mut db,
                    repo.as_deref(),
                    id.as_deref(),
                    *tool_calls,
                    at.as_deref(),
                )?;
            }
        },
        Commands::Tool(action) => match action {
            ToolAction::Start(args) => tool::start(&mut out, &mut db, args)?,
            ToolAction::End { tool: args, exit_code } => {
                tool::end(&mut out, &mut db, args, *exit_code)?;
            }
        },
        Commands::Commit(args) => commit::run(&mut out, &mut db, args)?,
        Commands::Link {
            repo,
            project,
            name,
            phase,
        } => {
            projects::link(&mut out, &mut db, repo, project, name.as_deref(), *phase)?;
        }
        Commands::Projects { json } => projects::list(&mut out, &db, *json)?,
        Commands::Stats { range, repo, json } => {
            let range = resolve_range(range, today, STATS_DEFAULT_DAYS)?;
            stats::run(&mut out, &db, range, repo.as_deref(), *json)?;
        }
        Commands::Commits { repo, limit, json } => {
            commits::run(&mut out, &db, repo.as_deref(), *limit, *json)?;
        }
        Commands::Roi { range, json } => {
            let range = resolve_range(range, today, REPORT_DEFAULT_DAYS)?;
            roi::run(&mut out, &db, range, config.roi_config(), *json)?;
        }
        Commands::Export { range } => {
            let range = resolve_range(range, today, REPORT_DEFAULT_DAYS)?;
            export::run(&mut out, &db, range)?;
        }
        Commands::Sync(action) => match action {
            SyncAction::Pending { limit, json } => sync::pending(&mut out, &db, *limit, *json)?,
            SyncAction::MarkPushed { hash } => sync::mark_pushed(&mut out, &mut db, hash)?,
        },
        Commands::Status => status::run(&mut out, &db, &config.database_path)?,
        Commands::Rebuild => rebuild::run(&mut out, &mut db)?,
    }

    Ok(())
}
