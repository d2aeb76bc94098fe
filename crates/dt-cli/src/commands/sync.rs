//! Project-sync queue: commits waiting to be posted to the external tracker.
//!
//! The tracker client lives outside this tool. It reads `dt sync pending --json`,
//! posts each update, then acknowledges it with `dt sync mark-pushed <hash>`.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use dt_core::{CommitHash, ProjectSyncRequest};
use dt_db::Database;

use super::util::short_hash;

/// A pending update with its tracker notes rendered.
#[derive(Debug, Serialize)]
struct PendingSync<'a> {
    #[serde(flatten)]
    request: &'a ProjectSyncRequest,
    notes: String,
}

pub fn pending<W: Write>(writer: &mut W, db: &Database, limit: usize, json: bool) -> Result<()> {
    let requests = db.pending_project_syncs(limit)?;
    if json {
        let pending: Vec<PendingSync<'_>> = requests
            .iter()
            .map(|request| PendingSync {
                request,
                notes: request.notes(),
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&pending)?)?;
        return Ok(());
    }

    if requests.is_empty() {
        writeln!(writer, "No commits awaiting sync.")?;
        return Ok(());
    }
    for request in &requests {
        writeln!(
            writer,
            "{}  {:<12} +{}/-{}  {}",
            short_hash(request.hash.as_str()),
            request.project_key.as_str(),
            request.insertions,
            request.deletions,
            request.message.lines().next().unwrap_or_default()
        )?;
    }
    Ok(())
}

pub fn mark_pushed<W: Write>(writer: &mut W, db: &mut Database, hash: &str) -> Result<()> {
    let hash = CommitHash::new(hash.trim())?;
    db.mark_pushed(&hash)
        .with_context(|| format!("failed to mark {hash} as pushed"))?;
    writeln!(writer, "Marked {hash} as pushed.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use dt_core::{CommitStats, NewCommit, ProjectKey, ProjectMapping, ProjectPhase};
    use insta::assert_snapshot;

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_project_mapping(&ProjectMapping {
            repo_path: "/work/api".into(),
            project_key: ProjectKey::new("proj-7").unwrap(),
            display_name: "api".into(),
            phase: ProjectPhase::Development,
        })
        .unwrap();
        db.record_commit(&NewCommit {
            hash: CommitHash::new("abc1234def").unwrap(),
            repo_path: "/work/api".into(),
            session_id: None,
            timestamp: DateTime::parse_from_rfc3339("2025-03-10T09:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            message: "Add login".into(),
            author: None,
            branch: None,
            stats: CommitStats {
                insertions: 10,
                deletions: 2,
                files_changed: 1,
            },
        })
        .unwrap();
        db
    }

    #[test]
    fn test_pending_then_mark_pushed() {
        let mut db = seeded();
        let mut output = Vec::new();

        pending(&mut output, &db, 10, false).unwrap();
        mark_pushed(&mut output, &mut db, "abc1234def").unwrap();
        pending(&mut output, &db, 10, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        abc1234  proj-7       +10/-2  Add login
        Marked abc1234def as pushed.
        No commits awaiting sync.
        ");
    }

    #[test]
    fn test_pending_json_includes_notes() {
        let db = seeded();
        let mut output = Vec::new();
        pending(&mut output, &db, 10, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value[0]["project_key"], "proj-7");
        assert_eq!(value[0]["notes"], "Add login\n\n+10 / -2 lines changed");
    }

    #[test]
    fn test_mark_pushed_unknown_hash() {
        let mut db = seeded();
        let mut output = Vec::new();
        let err = mark_pushed(&mut output, &mut db, "missing").unwrap_err();
        assert_snapshot!(format!("{err:#}"), @"failed to mark missing as pushed: commit not found: missing");
    }
}
