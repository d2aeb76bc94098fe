//! Developer activity tracker CLI library.
//!
//! Hook-facing write commands (`ingest`, `session`, `tool`, `commit`) and the
//! reporting commands built on the daily summaries.

mod cli;
pub mod commands;
mod config;

pub use cli::{
    Cli, CommitArgs, Commands, RangeArgs, SessionAction, SyncAction, ToolAction, ToolArgs,
};
pub use config::Config;
