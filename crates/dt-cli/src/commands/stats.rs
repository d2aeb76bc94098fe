//! Stats command: totals and velocity over a range of days.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use dt_core::{DailySummary, DateRange, SummaryTotals, repo_display_name};
use dt_db::Database;

use super::util::format_hours;

/// Stats for one range, as printed by `dt stats --json`.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub totals: SummaryTotals,
    pub commits_per_hour: f64,
    pub lines_per_hour: f64,
    pub efficiency_percent: f64,
    pub daily: Vec<DailySummary>,
}

pub fn build(db: &Database, range: DateRange, repo: Option<&str>) -> Result<StatsReport> {
    let daily = db.summaries(range, repo)?;
    let totals = SummaryTotals::from_summaries(&daily);
    let rates = totals.rates();
    Ok(StatsReport {
        start: range.start,
        end: range.end,
        repo: repo.map(str::to_string),
        totals,
        commits_per_hour: rates.commits_per_hour,
        lines_per_hour: rates.lines_per_hour,
        efficiency_percent: totals.efficiency_percent(),
        daily,
    })
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    range: DateRange,
    repo: Option<&str>,
    json: bool,
) -> Result<()> {
    let report = build(db, range, repo)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &StatsReport) -> Result<()> {
    writeln!(writer, "DEV STATS: {} to {}", report.start, report.end)?;
    if let Some(repo) = &report.repo {
        writeln!(writer, "Repository: {repo}")?;
    }

    if report.daily.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No activity recorded in this range.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'dt status' to check tracking health.")?;
        return Ok(());
    }

    let totals = &report.totals;
    writeln!(writer)?;
    writeln!(writer, "Sessions:       {}", totals.sessions)?;
    writeln!(writer, "Dev time:       {}", format_hours(totals.dev_hours))?;
    writeln!(
        writer,
        "Active coding:  {} ({:.1}%)",
        format_hours(totals.active_hours),
        report.efficiency_percent
    )?;
    writeln!(writer, "Commits:        {}", totals.commits)?;
    writeln!(
        writer,
        "Lines changed:  +{} / -{}",
        totals.insertions, totals.deletions
    )?;
    writeln!(writer, "Commits/hour:   {:.2}", report.commits_per_hour)?;
    writeln!(writer, "Lines/hour:     {:.2}", report.lines_per_hour)?;

    writeln!(writer)?;
    writeln!(writer, "BY DAY")?;
    writeln!(writer, "──────")?;
    for summary in &report.daily {
        writeln!(
            writer,
            "{}  {:<20} {:>8}  {:>3} commits  +{}/-{}",
            summary.date,
            repo_display_name(&summary.repo_path),
            format_hours(summary.total_dev_hours),
            summary.total_commits,
            summary.total_insertions,
            summary.total_deletions
        )?;
    }
    Ok(())
}
