//! Daily summary aggregation.
//!
//! Additive fields are merged with a single `INSERT ... ON CONFLICT DO UPDATE`
//! so two writers can never lose each other's increment. Derived fields are
//! recomputed from the merged totals in the same transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use dt_core::commit::average_gap_minutes;
use dt_core::{
    DailySummary, DateRange, ProjectKey, SessionId, SessionStatus, SummaryDelta, ToolEvent,
    active_coding_ms_between, require_non_empty,
};

use crate::commits::list_commits_in;
use crate::mappings::project_key_for;
use crate::sessions::{list_sessions_in, pre_close_tool_events_in};
use crate::{Database, DbError, format_date, parse_date, parse_timestamp};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Counts from a [`Database::rebuild_summaries`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub sessions: usize,
    pub commits: usize,
    pub summaries: usize,
}

impl Database {
    /// Adds `delta` to the summary for `(date, repo_path)`, creating it when absent.
    ///
    /// The project key is taken from the repository's current link the first
    /// time the key is created.
    pub fn merge_summary(
        &mut self,
        date: NaiveDate,
        repo_path: &str,
        delta: &SummaryDelta,
    ) -> Result<DailySummary, DbError> {
        let tx = self.immediate()?;
        let project_key = project_key_for(&tx, repo_path)?;
        let summary = merge_in(&tx, date, repo_path, delta, project_key.as_ref())?;
        tx.commit()?;
        Ok(summary)
    }

    pub fn get_summary(
        &self,
        date: NaiveDate,
        repo_path: &str,
    ) -> Result<Option<DailySummary>, DbError> {
        load_summary(&self.conn, date, repo_path)
    }

    /// Summaries within `range`, newest day first, then by repository.
    pub fn summaries(
        &self,
        range: DateRange,
        repo_path: Option<&str>,
    ) -> Result<Vec<DailySummary>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries
             WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR repo_path = ?3)
             ORDER BY date DESC, repo_path ASC"
        ))?;
        let rows = stmt.query_map(
            params![format_date(range.start), format_date(range.end), repo_path],
            SummaryRow::from_row,
        )?;
        rows.map(|row| row?.into_summary()).collect()
    }

    /// Recomputes every daily summary from stored sessions and commits.
    ///
    /// Active coding time is re-derived for each closed session from the tool
    /// events it closed with, over the same window used at close. Summary
    /// increments that were merged directly, without a backing session or
    /// commit, are not reproduced.
    pub fn rebuild_summaries(&mut self) -> Result<RebuildStats, DbError> {
        let tx = self.immediate()?;

        let sessions = list_sessions_in(&tx, Some(SessionStatus::Completed))?;
        let mut tool_events: HashMap<SessionId, Vec<ToolEvent>> = HashMap::new();
        for event in pre_close_tool_events_in(&tx)? {
            tool_events
                .entry(event.session_id.clone())
                .or_default()
                .push(event);
        }
        let active: Vec<i64> = sessions
            .par_iter()
            .map(|session| {
                match (tool_events.get(&session.session_id), session.ended_at) {
                    (Some(events), Some(ended_at)) => {
                        active_coding_ms_between(events, session.started_at, ended_at)
                    }
                    _ => 0,
                }
            })
            .collect();

        let mut rebuilt: BTreeMap<(NaiveDate, String), DailySummary> = BTreeMap::new();
        let mut commit_times: HashMap<(NaiveDate, String), Vec<DateTime<Utc>>> = HashMap::new();

        for (session, active_ms) in sessions.iter().zip(&active) {
            if session.active_coding_ms != *active_ms {
                tracing::warn!(
                    session = %session.session_id,
                    stored = session.active_coding_ms,
                    recomputed = active_ms,
                    "active coding time disagrees with tool events; correcting"
                );
                tx.execute(
                    "UPDATE sessions SET active_coding_ms = ?1 WHERE session_id = ?2",
                    params![active_ms, session.session_id.as_str()],
                )?;
            }
            #[allow(clippy::cast_precision_loss, reason = "millisecond spans fit in f64")]
            let delta = SummaryDelta::session_closed(
                session.dev_hours().unwrap_or(0.0),
                *active_ms as f64 / MS_PER_HOUR,
            );
            let summary = rebuilt
                .entry((session.date, session.repo_path.clone()))
                .or_insert_with(|| DailySummary::empty(session.date, session.repo_path.clone()));
            summary.project_key = summary.project_key.take().or(session.project_key.clone());
            summary.apply(&delta);
        }

        let commits = list_commits_in(&tx, None)?;
        for commit in &commits {
            let key = (commit.date, commit.repo_path.clone());
            commit_times
                .entry(key.clone())
                .or_default()
                .push(commit.timestamp);
            let summary = rebuilt
                .entry(key)
                .or_insert_with(|| DailySummary::empty(commit.date, commit.repo_path.clone()));
            summary.project_key = summary.project_key.take().or(commit.project_key.clone());
            summary.apply(&SummaryDelta::commit(&commit.stats));
        }

        tx.execute("DELETE FROM daily_summaries", [])?;
        for (key, summary) in &mut rebuilt {
            summary.avg_commit_gap_minutes = commit_times
                .get(key)
                .and_then(|times| average_gap_minutes(times));
            insert_summary(&tx, summary)?;
        }
        tx.commit()?;

        let stats = RebuildStats {
            sessions: sessions.len(),
            commits: commits.len(),
            summaries: rebuilt.len(),
        };
        tracing::info!(
            sessions = stats.sessions,
            commits = stats.commits,
            summaries = stats.summaries,
            "rebuilt daily summaries"
        );
        Ok(stats)
    }
}

/// Merges `delta` into one summary row and refreshes its derived fields.
pub(crate) fn merge_in(
    conn: &Connection,
    date: NaiveDate,
    repo_path: &str,
    delta: &SummaryDelta,
    project_key: Option<&ProjectKey>,
) -> Result<DailySummary, DbError> {
    require_non_empty("repo path", repo_path)?;
    delta.validate()?;

    let date_key = format_date(date);
    conn.execute(
        "INSERT INTO daily_summaries (
            date, repo_path, project_key, total_sessions, total_dev_hours,
            active_coding_hours, total_commits, total_insertions, total_deletions
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(date, repo_path) DO UPDATE SET
            project_key = COALESCE(project_key, excluded.project_key),
            total_sessions = total_sessions + excluded.total_sessions,
            total_dev_hours = total_dev_hours + excluded.total_dev_hours,
            active_coding_hours = active_coding_hours + excluded.active_coding_hours,
            total_commits = total_commits + excluded.total_commits,
            total_insertions = total_insertions + excluded.total_insertions,
            total_deletions = total_deletions + excluded.total_deletions",
        params![
            date_key,
            repo_path,
            project_key.map(ProjectKey::as_str),
            delta.sessions,
            delta.dev_hours,
            delta.active_hours,
            delta.commits,
            delta.insertions,
            delta.deletions,
        ],
    )?;

    let mut summary =
        load_summary(conn, date, repo_path)?.ok_or_else(|| DbError::NotFound {
            entity: "daily summary",
            id: format!("{date_key} {repo_path}"),
        })?;
    summary.recompute_rates();
    summary.avg_commit_gap_minutes = average_gap_minutes(&commit_times_in(conn, date, repo_path)?);

    conn.execute(
        "UPDATE daily_summaries
         SET avg_commit_gap_minutes = ?1, commits_per_hour = ?2, lines_per_hour = ?3
         WHERE date = ?4 AND repo_path = ?5",
        params![
            summary.avg_commit_gap_minutes,
            summary.commits_per_hour,
            summary.lines_per_hour,
            date_key,
            repo_path,
        ],
    )?;
    tracing::trace!(date = %date_key, repo = repo_path, ?delta, "merged summary");
    Ok(summary)
}

fn insert_summary(conn: &Connection, summary: &DailySummary) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO daily_summaries (
            date, repo_path, project_key, total_sessions, total_dev_hours,
            active_coding_hours, total_commits, total_insertions, total_deletions,
            avg_commit_gap_minutes, commits_per_hour, lines_per_hour
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            format_date(summary.date),
            summary.repo_path,
            summary.project_key.as_ref().map(ProjectKey::as_str),
            summary.total_sessions,
            summary.total_dev_hours,
            summary.active_coding_hours,
            summary.total_commits,
            summary.total_insertions,
            summary.total_deletions,
            summary.avg_commit_gap_minutes,
            summary.commits_per_hour,
            summary.lines_per_hour,
        ],
    )?;
    Ok(())
}

fn commit_times_in(
    conn: &Connection,
    date: NaiveDate,
    repo_path: &str,
) -> Result<Vec<DateTime<Utc>>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp FROM commits
         WHERE repo_path = ?1 AND date = ?2
         ORDER BY timestamp ASC",
    )?;
    let rows = stmt.query_map(params![repo_path, format_date(date)], |row| {
        row.get::<_, String>(0)
    })?;
    rows.map(|row| parse_timestamp(&row?, "timestamp"))
        .collect()
}

const SUMMARY_COLUMNS: &str = "date, repo_path, project_key, total_sessions, total_dev_hours,
    active_coding_hours, total_commits, total_insertions, total_deletions,
    avg_commit_gap_minutes, commits_per_hour, lines_per_hour";

fn load_summary(
    conn: &Connection,
    date: NaiveDate,
    repo_path: &str,
) -> Result<Option<DailySummary>, DbError> {
    conn.query_row(
        &format!("SELECT {SUMMARY_COLUMNS} FROM daily_summaries WHERE date = ?1 AND repo_path = ?2"),
        params![format_date(date), repo_path],
        SummaryRow::from_row,
    )
    .optional()?
    .map(SummaryRow::into_summary)
    .transpose()
}

struct SummaryRow {
    date: String,
    repo_path: String,
    project_key: Option<String>,
    total_sessions: i64,
    total_dev_hours: f64,
    active_coding_hours: f64,
    total_commits: i64,
    total_insertions: i64,
    total_deletions: i64,
    avg_commit_gap_minutes: Option<f64>,
    commits_per_hour: f64,
    lines_per_hour: f64,
}

impl SummaryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            repo_path: row.get(1)?,
            project_key: row.get(2)?,
            total_sessions: row.get(3)?,
            total_dev_hours: row.get(4)?,
            active_coding_hours: row.get(5)?,
            total_commits: row.get(6)?,
            total_insertions: row.get(7)?,
            total_deletions: row.get(8)?,
            avg_commit_gap_minutes: row.get(9)?,
            commits_per_hour: row.get(10)?,
            lines_per_hour: row.get(11)?,
        })
    }

    fn into_summary(self) -> Result<DailySummary, DbError> {
        Ok(DailySummary {
            date: parse_date(&self.date, "date")?,
            repo_path: self.repo_path,
            project_key: self.project_key.map(ProjectKey::new).transpose()?,
            total_sessions: self.total_sessions,
            total_dev_hours: self.total_dev_hours,
            active_coding_hours: self.active_coding_hours,
            total_commits: self.total_commits,
            total_insertions: self.total_insertions,
            total_deletions: self.total_deletions,
            avg_commit_gap_minutes: self.avg_commit_gap_minutes,
            commits_per_hour: self.commits_per_hour,
            lines_per_hour: self.lines_per_hour,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dt_core::{CommitHash, CommitStats, NewCommit, ToolPhase, ValidationError};

    const REPO: &str = "/work/api";

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn commit(hash: &str, at: &str, insertions: i64) -> NewCommit {
        NewCommit {
            hash: CommitHash::new(hash).unwrap(),
            repo_path: REPO.into(),
            session_id: None,
            timestamp: ts(at),
            message: format!("commit {hash}"),
            author: None,
            branch: None,
            stats: CommitStats {
                insertions,
                deletions: 0,
                files_changed: 1,
            },
        }
    }

    #[test]
    fn merge_creates_then_adds() {
        let mut db = Database::open_in_memory().unwrap();
        db.merge_summary(day(), REPO, &SummaryDelta::session_closed(1.5, 0.5))
            .unwrap();
        let merged = db
            .merge_summary(day(), REPO, &SummaryDelta::session_closed(0.5, 0.25))
            .unwrap();

        assert_eq!(merged.total_sessions, 2);
        assert!((merged.total_dev_hours - 2.0).abs() < 1e-9);
        assert!((merged.active_coding_hours - 0.75).abs() < 1e-9);
        assert_eq!(db.get_summary(day(), REPO).unwrap().unwrap(), merged);
    }

    #[test]
    fn zero_delta_creates_empty_row() {
        let mut db = Database::open_in_memory().unwrap();
        let summary = db
            .merge_summary(day(), REPO, &SummaryDelta::default())
            .unwrap();
        assert_eq!(summary, DailySummary::empty(day(), REPO.into()));
    }

    #[test]
    fn negative_delta_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let delta = SummaryDelta {
            insertions: -3,
            ..SummaryDelta::default()
        };
        let err = db.merge_summary(day(), REPO, &delta).unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::NegativeCount { .. })
        ));
        assert!(db.get_summary(day(), REPO).unwrap().is_none());
    }

    #[test]
    fn rates_recomputed_on_every_merge() {
        let mut db = Database::open_in_memory().unwrap();
        db.record_commit(&commit("a1", "2025-03-10T09:10:00Z", 12))
            .unwrap();
        let before = db.get_summary(day(), REPO).unwrap().unwrap();
        assert!(before.commits_per_hour.abs() < f64::EPSILON);

        let after = db
            .merge_summary(day(), REPO, &SummaryDelta::session_closed(2.0, 1.0))
            .unwrap();
        assert!((after.commits_per_hour - 0.5).abs() < 1e-9);
        assert!((after.lines_per_hour - 6.0).abs() < 1e-9);
    }

    #[test]
    fn average_gap_tracks_commits_of_the_day() {
        let mut db = Database::open_in_memory().unwrap();
        db.record_commit(&commit("a1", "2025-03-10T09:00:00Z", 1))
            .unwrap();
        assert_eq!(
            db.get_summary(day(), REPO)
                .unwrap()
                .unwrap()
                .avg_commit_gap_minutes,
            None
        );
        db.record_commit(&commit("a3", "2025-03-10T10:00:00Z", 1))
            .unwrap();
        db.record_commit(&commit("a2", "2025-03-10T09:20:00Z", 1))
            .unwrap();

        let gap = db
            .get_summary(day(), REPO)
            .unwrap()
            .unwrap()
            .avg_commit_gap_minutes
            .unwrap();
        assert!((gap - 30.0).abs() < 1e-9);
    }

    #[test]
    fn range_query_filters_and_orders() {
        let mut db = Database::open_in_memory().unwrap();
        let delta = SummaryDelta::session_closed(1.0, 0.0);
        for (offset, repo) in [(0, "/work/b"), (0, "/work/a"), (1, "/work/a"), (5, "/work/a")] {
            db.merge_summary(day() - chrono::Duration::days(offset), repo, &delta)
                .unwrap();
        }

        let range = DateRange::last_days(day(), 1);
        let keys: Vec<(NaiveDate, String)> = db
            .summaries(range, None)
            .unwrap()
            .into_iter()
            .map(|s| (s.date, s.repo_path))
            .collect();
        assert_eq!(
            keys,
            vec![
                (day(), "/work/a".to_string()),
                (day(), "/work/b".to_string()),
                (day() - chrono::Duration::days(1), "/work/a".to_string()),
            ]
        );
        assert_eq!(db.summaries(range, Some("/work/b")).unwrap().len(), 1);
    }

    #[test]
    fn rebuild_ignores_tool_events_after_close() {
        let mut db = Database::open_in_memory().unwrap();
        let (id, _) = db
            .apply_session_start(REPO, ts("2025-03-10T09:00:00Z"))
            .unwrap();
        db.apply_session_end(&id, ts("2025-03-10T10:00:00Z"), 0)
            .unwrap();

        // One pair after the end, one inside the session that arrived late.
        for (phase, at) in [
            (ToolPhase::Start, "2025-03-10T10:05:00Z"),
            (ToolPhase::End, "2025-03-10T10:35:00Z"),
            (ToolPhase::Start, "2025-03-10T09:10:00Z"),
            (ToolPhase::End, "2025-03-10T09:20:00Z"),
        ] {
            db.apply_tool_event(
                REPO,
                &ToolEvent {
                    session_id: id.clone(),
                    tool_name: "Edit".into(),
                    phase,
                    timestamp: ts(at),
                    exit_code: None,
                },
            )
            .unwrap();
        }

        let before = db.get_summary(day(), REPO).unwrap().unwrap();
        db.rebuild_summaries().unwrap();
        let after = db.get_summary(day(), REPO).unwrap().unwrap();

        assert!((after.active_coding_hours - before.active_coding_hours).abs() < 1e-12);
        assert!(after.active_coding_hours.abs() < 1e-12);
        assert_eq!(db.get_session(&id).unwrap().unwrap().active_coding_ms, 0);
        assert_eq!(db.tool_events(&id).unwrap().len(), 4);
    }

    #[test]
    fn rebuild_reproduces_incremental_totals() {
        let mut db = Database::open_in_memory().unwrap();
        let (id, _) = db
            .apply_session_start(REPO, ts("2025-03-10T09:00:00Z"))
            .unwrap();
        for (phase, at) in [
            (ToolPhase::Start, "2025-03-10T09:05:00Z"),
            (ToolPhase::End, "2025-03-10T09:35:00Z"),
        ] {
            db.apply_tool_event(
                REPO,
                &ToolEvent {
                    session_id: id.clone(),
                    tool_name: "Edit".into(),
                    phase,
                    timestamp: ts(at),
                    exit_code: None,
                },
            )
            .unwrap();
        }
        db.record_commit(&commit("a1", "2025-03-10T09:30:00Z", 10))
            .unwrap();
        db.record_commit(&commit("a2", "2025-03-10T09:50:00Z", 4))
            .unwrap();
        db.apply_session_end(&id, ts("2025-03-10T11:00:00Z"), 0)
            .unwrap();

        let incremental = db.get_summary(day(), REPO).unwrap().unwrap();
        let stats = db.rebuild_summaries().unwrap();
        let rebuilt = db.get_summary(day(), REPO).unwrap().unwrap();

        assert_eq!(
            stats,
            RebuildStats {
                sessions: 1,
                commits: 2,
                summaries: 1,
            }
        );
        assert_eq!(rebuilt.total_sessions, incremental.total_sessions);
        assert_eq!(rebuilt.total_commits, 2);
        assert_eq!(rebuilt.total_insertions, 14);
        assert!((rebuilt.total_dev_hours - incremental.total_dev_hours).abs() < 1e-9);
        assert!((rebuilt.active_coding_hours - 0.5).abs() < 1e-9);
        assert_eq!(rebuilt.avg_commit_gap_minutes, Some(20.0));
        assert!((rebuilt.commits_per_hour - 1.0).abs() < 1e-9);
    }
}
