//! Commit records and commit-gap analysis.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{CommitPayload, Event, EventKind};
use crate::types::{
    CommitHash, ProjectKey, SessionId, ValidationError, require_count, require_non_empty,
};

/// Line and file counts reported by `git show --shortstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    #[serde(default)]
    pub insertions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub files_changed: i64,
}

impl CommitStats {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_count("insertions", self.insertions)?;
        require_count("deletions", self.deletions)?;
        require_count("files changed", self.files_changed)?;
        Ok(())
    }

    pub const fn lines_changed(&self) -> i64 {
        self.insertions.saturating_add(self.deletions)
    }
}

/// A commit as submitted for recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub hash: CommitHash,
    pub repo_path: String,
    /// Session the producer attributed the commit to, if any.
    pub session_id: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub author: Option<String>,
    pub branch: Option<String>,
    pub stats: CommitStats,
}

impl NewCommit {
    /// Builds a commit from a validated commit event.
    ///
    /// Returns `None` for any other event kind.
    pub fn from_event(event: &Event) -> Option<Self> {
        let EventKind::Commit(payload) = &event.kind else {
            return None;
        };
        let CommitPayload {
            hash,
            message,
            author,
            branch,
            stats,
        } = payload.clone();
        Some(Self {
            hash,
            repo_path: event.repo_path.clone()?,
            session_id: event.session_id.clone(),
            timestamp: event.timestamp,
            message,
            author,
            branch,
            stats,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("repo path", &self.repo_path)?;
        self.stats.validate()
    }

    /// Calendar day (UTC) the commit is aggregated under.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A stored commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: CommitHash,
    pub repo_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Project resolved when the commit was recorded; never re-resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<ProjectKey>,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub stats: CommitStats,
    pub pushed_externally: bool,
}

impl CommitRecord {
    /// The fields an external tracker update needs, when a project is linked.
    pub fn sync_request(&self) -> Option<ProjectSyncRequest> {
        let project_key = self.project_key.clone()?;
        Some(ProjectSyncRequest {
            project_key,
            hash: self.hash.clone(),
            message: self.message.clone(),
            insertions: self.stats.insertions,
            deletions: self.stats.deletions,
        })
    }
}

/// Result of recording a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// `false` when the hash was already stored; nothing changed.
    pub accepted: bool,
    /// Present for accepted commits in a linked repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<ProjectSyncRequest>,
}

/// Everything needed to post a commit to the external project tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSyncRequest {
    pub project_key: ProjectKey,
    pub hash: CommitHash,
    pub message: String,
    pub insertions: i64,
    pub deletions: i64,
}

impl ProjectSyncRequest {
    /// Update notes in the tracker's format: the message followed by line stats.
    pub fn notes(&self) -> String {
        format!(
            "{}\n\n+{} / -{} lines changed",
            self.message, self.insertions, self.deletions
        )
    }
}

/// Minutes since the previous commit, for timestamps sorted ascending.
///
/// The first entry is `None`.
#[allow(clippy::cast_precision_loss, reason = "millisecond spans fit in f64")]
pub fn previous_gap_minutes(sorted: &[DateTime<Utc>]) -> Vec<Option<f64>> {
    let mut gaps = Vec::with_capacity(sorted.len());
    let mut previous: Option<DateTime<Utc>> = None;
    for timestamp in sorted {
        gaps.push(previous.map(|prev| {
            timestamp.signed_duration_since(prev).num_milliseconds() as f64 / 60_000.0
        }));
        previous = Some(*timestamp);
    }
    gaps
}

/// Mean gap in minutes between successive commits, in timestamp order.
///
/// Sorts its own copy, so commits may arrive in any order. `None` with fewer
/// than two commits.
#[allow(clippy::cast_precision_loss, reason = "commit counts fit in f64")]
pub fn average_gap_minutes(timestamps: &[DateTime<Utc>]) -> Option<f64> {
    if timestamps.len() < 2 {
        return None;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    let gaps: Vec<f64> = previous_gap_minutes(&sorted).into_iter().flatten().collect();
    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn average_gap_needs_two_commits() {
        assert_eq!(average_gap_minutes(&[]), None);
        assert_eq!(average_gap_minutes(&[base()]), None);
    }

    #[test]
    fn average_gap_sorts_out_of_order_commits() {
        let timestamps = [
            base() + Duration::minutes(30),
            base(),
            base() + Duration::minutes(90),
        ];
        // gaps 30 and 60
        let avg = average_gap_minutes(&timestamps).unwrap();
        assert!((avg - 45.0).abs() < 1e-9);
    }

    #[test]
    fn previous_gaps_start_with_none() {
        let gaps = previous_gap_minutes(&[base(), base() + Duration::minutes(15)]);
        assert_eq!(gaps, vec![None, Some(15.0)]);
    }

    #[test]
    fn sync_request_requires_project() {
        let mut record = CommitRecord {
            hash: CommitHash::new("abc").unwrap(),
            repo_path: "/repo".into(),
            session_id: None,
            project_key: None,
            timestamp: base(),
            date: base().date_naive(),
            message: "Add parser".into(),
            author: None,
            branch: Some("main".into()),
            stats: CommitStats {
                insertions: 10,
                deletions: 2,
                files_changed: 1,
            },
            pushed_externally: false,
        };
        assert!(record.sync_request().is_none());

        record.project_key = Some(ProjectKey::new("proj-1").unwrap());
        let request = record.sync_request().unwrap();
        assert_eq!(request.notes(), "Add parser\n\n+10 / -2 lines changed");
    }

    #[test]
    fn from_event_ignores_other_kinds() {
        let event = Event::new(EventKind::SessionStart, None, Some("/repo".into()), base());
        assert!(NewCommit::from_event(&event).is_none());
    }
}
