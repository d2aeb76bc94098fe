//! Per-day, per-repository aggregates.
//!
//! Additive fields only ever grow; derived fields are a pure function of the
//! additive totals plus the day's commit timestamps.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::commit::CommitStats;
use crate::types::{ProjectKey, ValidationError, require_count};

/// Increment applied to one daily summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryDelta {
    #[serde(default)]
    pub sessions: i64,
    #[serde(default)]
    pub dev_hours: f64,
    #[serde(default)]
    pub active_hours: f64,
    #[serde(default)]
    pub commits: i64,
    #[serde(default)]
    pub insertions: i64,
    #[serde(default)]
    pub deletions: i64,
}

impl SummaryDelta {
    /// Contribution of one closed session.
    pub const fn session_closed(dev_hours: f64, active_hours: f64) -> Self {
        Self {
            sessions: 1,
            dev_hours,
            active_hours,
            commits: 0,
            insertions: 0,
            deletions: 0,
        }
    }

    /// Contribution of one accepted commit.
    pub const fn commit(stats: &CommitStats) -> Self {
        Self {
            sessions: 0,
            dev_hours: 0.0,
            active_hours: 0.0,
            commits: 1,
            insertions: stats.insertions,
            deletions: stats.deletions,
        }
    }

    /// Rejects deltas that would shrink a total.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_count("sessions", self.sessions)?;
        require_count("commits", self.commits)?;
        require_count("insertions", self.insertions)?;
        require_count("deletions", self.deletions)?;
        require_hours("dev hours", self.dev_hours)?;
        require_hours("active hours", self.active_hours)?;
        Ok(())
    }
}

fn require_hours(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidHours { field, value });
    }
    Ok(())
}

/// Aggregate for one `(date, repo_path)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub repo_path: String,
    /// First project resolved for this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<ProjectKey>,
    pub total_sessions: i64,
    pub total_dev_hours: f64,
    pub active_coding_hours: f64,
    pub total_commits: i64,
    pub total_insertions: i64,
    pub total_deletions: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_commit_gap_minutes: Option<f64>,
    pub commits_per_hour: f64,
    pub lines_per_hour: f64,
}

impl DailySummary {
    /// An empty summary for the key.
    pub const fn empty(date: NaiveDate, repo_path: String) -> Self {
        Self {
            date,
            repo_path,
            project_key: None,
            total_sessions: 0,
            total_dev_hours: 0.0,
            active_coding_hours: 0.0,
            total_commits: 0,
            total_insertions: 0,
            total_deletions: 0,
            avg_commit_gap_minutes: None,
            commits_per_hour: 0.0,
            lines_per_hour: 0.0,
        }
    }

    /// Adds `delta` to the additive fields and refreshes the rate fields.
    ///
    /// The average commit gap needs the day's commit timestamps and is left to
    /// the caller.
    pub fn apply(&mut self, delta: &SummaryDelta) {
        self.total_sessions = self.total_sessions.saturating_add(delta.sessions);
        self.total_dev_hours += delta.dev_hours;
        self.active_coding_hours += delta.active_hours;
        self.total_commits = self.total_commits.saturating_add(delta.commits);
        self.total_insertions = self.total_insertions.saturating_add(delta.insertions);
        self.total_deletions = self.total_deletions.saturating_add(delta.deletions);
        self.recompute_rates();
    }

    /// Recomputes `commits_per_hour` and `lines_per_hour` from the totals.
    pub fn recompute_rates(&mut self) {
        let rates = Rates::from_totals(
            self.total_commits,
            self.lines_changed(),
            self.total_dev_hours,
        );
        self.commits_per_hour = rates.commits_per_hour;
        self.lines_per_hour = rates.lines_per_hour;
    }

    pub const fn lines_changed(&self) -> i64 {
        self.total_insertions.saturating_add(self.total_deletions)
    }
}

/// Velocity figures derived from totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub commits_per_hour: f64,
    pub lines_per_hour: f64,
}

impl Rates {
    /// Both rates are 0 when no development time has been recorded.
    #[allow(clippy::cast_precision_loss, reason = "counts fit in f64")]
    pub fn from_totals(commits: i64, lines: i64, dev_hours: f64) -> Self {
        if dev_hours <= 0.0 {
            return Self {
                commits_per_hour: 0.0,
                lines_per_hour: 0.0,
            };
        }
        Self {
            commits_per_hour: commits as f64 / dev_hours,
            lines_per_hour: lines as f64 / dev_hours,
        }
    }
}

/// Sums over a set of daily summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryTotals {
    pub sessions: i64,
    pub dev_hours: f64,
    pub active_hours: f64,
    pub commits: i64,
    pub insertions: i64,
    pub deletions: i64,
}

impl SummaryTotals {
    pub fn from_summaries<'a>(summaries: impl IntoIterator<Item = &'a DailySummary>) -> Self {
        summaries
            .into_iter()
            .fold(Self::default(), |mut totals, summary| {
                totals.sessions = totals.sessions.saturating_add(summary.total_sessions);
                totals.dev_hours += summary.total_dev_hours;
                totals.active_hours += summary.active_coding_hours;
                totals.commits = totals.commits.saturating_add(summary.total_commits);
                totals.insertions = totals.insertions.saturating_add(summary.total_insertions);
                totals.deletions = totals.deletions.saturating_add(summary.total_deletions);
                totals
            })
    }

    pub fn rates(&self) -> Rates {
        Rates::from_totals(
            self.commits,
            self.insertions.saturating_add(self.deletions),
            self.dev_hours,
        )
    }

    /// Share of session time spent in matched tool intervals, as a percentage.
    pub fn efficiency_percent(&self) -> f64 {
        if self.dev_hours <= 0.0 {
            return 0.0;
        }
        self.active_hours / self.dev_hours * 100.0
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns an error when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::EndBeforeStart {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending on `today`, inclusive. `days = 0` is just today.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
