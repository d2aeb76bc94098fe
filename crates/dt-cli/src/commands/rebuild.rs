//! Rebuild daily summaries from stored sessions and commits.

use std::io::Write;

use anyhow::{Context, Result};

use dt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let stats = db
        .rebuild_summaries()
        .context("failed to rebuild summaries")?;
    writeln!(
        writer,
        "Rebuilt {} daily summaries from {} sessions and {} commits.",
        stats.summaries, stats.sessions, stats.commits
    )?;
    Ok(())
}
