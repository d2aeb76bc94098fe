//! Commit recording and commit history queries.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use dt_core::commit::previous_gap_minutes;
use dt_core::{
    CommitHash, CommitOutcome, CommitRecord, CommitStats, NewCommit, ProjectKey,
    ProjectSyncRequest, SessionId, SummaryDelta, session_id_for,
};

use crate::mappings::project_key_for;
use crate::sessions::session_exists;
use crate::summaries::merge_in;
use crate::{Database, DbError, format_date, format_timestamp, parse_date, parse_timestamp};

/// A commit with the minutes since the previous commit in the same repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitGap {
    #[serde(flatten)]
    pub commit: CommitRecord,
    /// `None` for the first commit recorded in the repository.
    pub gap_minutes: Option<f64>,
}

impl Database {
    /// Records a commit once per hash and merges its stats into the daily summary.
    ///
    /// A hash that is already stored yields `accepted: false` and no changes.
    /// Accepted commits in a linked repository carry the project-sync request.
    pub fn record_commit(&mut self, commit: &NewCommit) -> Result<CommitOutcome, DbError> {
        let tx = self.immediate()?;
        let outcome = record_commit_in(&tx, commit)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Flags a commit as delivered to the external project tracker.
    ///
    /// Marking an already-pushed commit again is a no-op.
    pub fn mark_pushed(&mut self, hash: &CommitHash) -> Result<(), DbError> {
        let tx = self.immediate()?;
        let updated = tx.execute(
            "UPDATE commits SET pushed_externally = 1 WHERE hash = ?1",
            [hash.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound {
                entity: "commit",
                id: hash.to_string(),
            });
        }
        tx.commit()?;
        tracing::debug!(%hash, "marked commit as pushed");
        Ok(())
    }

    pub fn get_commit(&self, hash: &CommitHash) -> Result<Option<CommitRecord>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE hash = ?1"),
                [hash.as_str()],
                CommitRow::from_row,
            )
            .optional()?
            .map(CommitRow::into_record)
            .transpose()
    }

    /// The newest commits, optionally limited to one repository.
    pub fn recent_commits(
        &self,
        repo_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CommitRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE (?1 IS NULL OR repo_path = ?1)
             ORDER BY timestamp DESC, hash ASC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![repo_path, limit_param(limit)], CommitRow::from_row)?;
        rows.map(|row| row?.into_record()).collect()
    }

    /// The newest commits with their gap to the previous commit in the same repository.
    ///
    /// The previous commit is looked up across all stored history, so the
    /// oldest entry in the result still has a gap when earlier commits exist.
    pub fn commit_gaps(
        &self,
        repo_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CommitGap>, DbError> {
        let history = list_commits_in(&self.conn, repo_path)?;

        let mut by_repo: HashMap<&str, Vec<&CommitRecord>> = HashMap::new();
        for commit in &history {
            by_repo.entry(commit.repo_path.as_str()).or_default().push(commit);
        }
        let mut gaps: HashMap<&CommitHash, Option<f64>> = HashMap::new();
        for commits in by_repo.values() {
            let times: Vec<_> = commits.iter().map(|c| c.timestamp).collect();
            for (commit, gap) in commits.iter().zip(previous_gap_minutes(&times)) {
                gaps.insert(&commit.hash, gap);
            }
        }

        Ok(self
            .recent_commits(repo_path, limit)?
            .into_iter()
            .map(|commit| {
                let gap_minutes = gaps.get(&commit.hash).copied().flatten();
                CommitGap {
                    commit,
                    gap_minutes,
                }
            })
            .collect())
    }

    /// Accepted commits in linked repositories not yet delivered to the tracker,
    /// oldest first.
    pub fn pending_project_syncs(&self, limit: usize) -> Result<Vec<ProjectSyncRequest>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE project_key IS NOT NULL AND pushed_externally = 0
             ORDER BY timestamp ASC, hash ASC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map([limit_param(limit)], CommitRow::from_row)?;
        let mut requests = Vec::new();
        for row in rows {
            if let Some(request) = row?.into_record()?.sync_request() {
                requests.push(request);
            }
        }
        Ok(requests)
    }
}

pub(crate) fn record_commit_in(
    conn: &Connection,
    commit: &NewCommit,
) -> Result<CommitOutcome, DbError> {
    commit.validate()?;
    let project_key = project_key_for(conn, &commit.repo_path)?;
    let session_id = match &commit.session_id {
        Some(session_id) => Some(session_id.clone()),
        None => {
            let derived = session_id_for(&commit.repo_path, commit.timestamp);
            session_exists(conn, &derived)?.then_some(derived)
        }
    };
    let date = commit.date();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO commits (
            hash, repo_path, session_id, project_key, timestamp, date, message,
            author, branch, insertions, deletions, files_changed
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            commit.hash.as_str(),
            commit.repo_path,
            session_id.as_ref().map(SessionId::as_str),
            project_key.as_ref().map(ProjectKey::as_str),
            format_timestamp(commit.timestamp),
            format_date(date),
            commit.message,
            commit.author,
            commit.branch,
            commit.stats.insertions,
            commit.stats.deletions,
            commit.stats.files_changed,
        ],
    )?;
    if inserted == 0 {
        tracing::debug!(hash = %commit.hash, "commit already recorded");
        return Ok(CommitOutcome {
            accepted: false,
            sync: None,
        });
    }

    merge_in(
        conn,
        date,
        &commit.repo_path,
        &SummaryDelta::commit(&commit.stats),
        project_key.as_ref(),
    )?;
    tracing::debug!(
        hash = %commit.hash,
        repo = %commit.repo_path,
        insertions = commit.stats.insertions,
        deletions = commit.stats.deletions,
        "recorded commit"
    );

    let sync = project_key.map(|project_key| ProjectSyncRequest {
        project_key,
        hash: commit.hash.clone(),
        message: commit.message.clone(),
        insertions: commit.stats.insertions,
        deletions: commit.stats.deletions,
    });
    Ok(CommitOutcome {
        accepted: true,
        sync,
    })
}

/// All commits in timestamp order, optionally limited to one repository.
pub(crate) fn list_commits_in(
    conn: &Connection,
    repo_path: Option<&str>,
) -> Result<Vec<CommitRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMIT_COLUMNS} FROM commits
         WHERE (?1 IS NULL OR repo_path = ?1)
         ORDER BY timestamp ASC, hash ASC"
    ))?;
    let rows = stmt.query_map([repo_path], CommitRow::from_row)?;
    rows.map(|row| row?.into_record()).collect()
}

/// SQLite takes `LIMIT` as a signed integer.
fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

const COMMIT_COLUMNS: &str = "hash, repo_path, session_id, project_key, timestamp, date, message,
    author, branch, insertions, deletions, files_changed, pushed_externally";

struct CommitRow {
    hash: String,
    repo_path: String,
    session_id: Option<String>,
    project_key: Option<String>,
    timestamp: String,
    date: String,
    message: String,
    author: Option<String>,
    branch: Option<String>,
    insertions: i64,
    deletions: i64,
    files_changed: i64,
    pushed_externally: bool,
}

impl CommitRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hash: row.get(0)?,
            repo_path: row.get(1)?,
            session_id: row.get(2)?,
            project_key: row.get(3)?,
            timestamp: row.get(4)?,
            date: row.get(5)?,
            message: row.get(6)?,
            author: row.get(7)?,
            branch: row.get(8)?,
            insertions: row.get(9)?,
            deletions: row.get(10)?,
            files_changed: row.get(11)?,
            pushed_externally: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<CommitRecord, DbError> {
        Ok(CommitRecord {
            hash: CommitHash::new(self.hash)?,
            repo_path: self.repo_path,
            session_id: self.session_id.map(SessionId::new).transpose()?,
            project_key: self.project_key.map(ProjectKey::new).transpose()?,
            timestamp: parse_timestamp(&self.timestamp, "timestamp")?,
            date: parse_date(&self.date, "date")?,
            message: self.message,
            author: self.author,
            branch: self.branch,
            stats: CommitStats {
                insertions: self.insertions,
                deletions: self.deletions,
                files_changed: self.files_changed,
            },
            pushed_externally: self.pushed_externally,
        })
    }
}
