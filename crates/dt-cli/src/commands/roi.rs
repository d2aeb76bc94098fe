//! ROI report: estimated time and cost saved over a range of days.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use dt_core::{DailySummary, DateRange, ProjectKey, RoiConfig, RoiEstimate, SummaryTotals, roi};
use dt_db::Database;

use super::util::format_hours;

const UNLINKED: &str = "Unlinked";

/// ROI for one project, or for unlinked repositories.
#[derive(Debug, Serialize)]
pub struct ProjectRoi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_key: Option<ProjectKey>,
    pub name: String,
    pub commits: i64,
    pub estimate: RoiEstimate,
}

#[derive(Debug, Serialize)]
pub struct RoiReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub totals: RoiEstimate,
    pub projects: Vec<ProjectRoi>,
}

pub fn build(db: &Database, range: DateRange, config: RoiConfig) -> Result<RoiReport> {
    let summaries = db.summaries(range, None)?;
    let names: BTreeMap<ProjectKey, String> = db
        .list_project_mappings()?
        .into_iter()
        .map(|m| (m.project_key, m.display_name))
        .collect();

    let mut by_project: BTreeMap<Option<ProjectKey>, Vec<&DailySummary>> = BTreeMap::new();
    for summary in &summaries {
        by_project
            .entry(summary.project_key.clone())
            .or_default()
            .push(summary);
    }

    let totals = SummaryTotals::from_summaries(&summaries);
    let overall = roi(totals.dev_hours, config).context("invalid ROI configuration")?;

    let mut projects = Vec::with_capacity(by_project.len());
    for (project_key, rows) in by_project {
        let totals = SummaryTotals::from_summaries(rows);
        let name = project_key
            .as_ref()
            .map_or(UNLINKED, |key| {
                names.get(key).map_or(key.as_str(), String::as_str)
            })
            .to_string();
        projects.push(ProjectRoi {
            project_key,
            name,
            commits: totals.commits,
            estimate: roi(totals.dev_hours, config)?,
        });
    }
    projects.sort_by(|a, b| {
        b.estimate
            .dev_hours
            .total_cmp(&a.estimate.dev_hours)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(RoiReport {
        start: range.start,
        end: range.end,
        totals: overall,
        projects,
    })
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    range: DateRange,
    config: RoiConfig,
    json: bool,
) -> Result<()> {
    let report = build(db, range, config)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let totals = &report.totals;
    writeln!(writer, "ROI ESTIMATE: {} to {}", report.start, report.end)?;
    writeln!(
        writer,
        "Multiplier: {}x at ${:.2}/hour",
        totals.multiplier, totals.hourly_rate
    )?;
    writeln!(writer)?;
    writeln!(writer, "Dev time:         {}", format_hours(totals.dev_hours))?;
    writeln!(
        writer,
        "Manual estimate:  {}",
        format_hours(totals.manual_hours_estimate)
    )?;
    writeln!(writer, "Time saved:       {}", format_hours(totals.time_saved))?;
    writeln!(writer, "Cost savings:     ${:.2}", totals.cost_savings)?;
    writeln!(
        writer,
        "Efficiency gain:  {:.0}%",
        totals.efficiency_gain_percent
    )?;

    if report.projects.is_empty() {
        return Ok(());
    }
    writeln!(writer)?;
    writeln!(writer, "BY PROJECT")?;
    writeln!(writer, "──────────")?;
    for project in &report.projects {
        writeln!(
            writer,
            "{:<20} {:>8}  {:>3} commits  saved {:>8}  ${:.2}",
            project.name,
            format_hours(project.estimate.dev_hours),
            project.commits,
            format_hours(project.estimate.time_saved),
            project.estimate.cost_savings
        )?;
    }
    Ok(())
}
