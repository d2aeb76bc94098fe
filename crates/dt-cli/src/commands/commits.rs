//! Recent commits with the gap since the previous commit.

use std::io::Write;

use anyhow::Result;

use dt_core::repo_display_name;
use dt_db::Database;

use super::util::{format_hours, short_hash};

const MESSAGE_WIDTH: usize = 40;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    repo: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let gaps = db.commit_gaps(repo, limit)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&gaps)?)?;
        return Ok(());
    }

    if gaps.is_empty() {
        writeln!(writer, "No commits recorded.")?;
        return Ok(());
    }

    for gap in &gaps {
        let commit = &gap.commit;
        let since_previous = gap
            .gap_minutes
            .map_or_else(|| "-".to_string(), |minutes| format_hours(minutes / 60.0));
        writeln!(
            writer,
            "{}  {}  {:<16} {:>10}  {:>8}  {}",
            short_hash(commit.hash.as_str()),
            commit.timestamp.format("%Y-%m-%d %H:%M"),
            repo_display_name(&commit.repo_path),
            format!("+{}/-{}", commit.stats.insertions, commit.stats.deletions),
            since_previous,
            truncate(&commit.message, MESSAGE_WIDTH)
        )?;
    }
    Ok(())
}

fn truncate(message: &str, width: usize) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() <= width {
        return first_line.to_string();
    }
    let kept: String = first_line.chars().take(width).collect();
    format!("{kept}...")
}
