//! Status command for showing tracking health.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use dt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let active = db.active_session_count()?;
    let last_events = db.last_event_times_by_type()?;

    writeln!(writer, "Developer tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Active sessions: {active}")?;
    writeln!(writer, "Pending project syncs: {}", db.pending_project_syncs(usize::MAX)?.len())?;

    if last_events.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Last events:")?;
    for last in last_events {
        writeln!(
            writer,
            "- {}: {}",
            last.event_type,
            last.last_event.format("%Y-%m-%dT%H:%M:%SZ")
        )?;
    }

    Ok(())
}
