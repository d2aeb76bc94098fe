//! CSV export of daily summaries for accounting.
//!
//! Each row is one `(date, repository)` summary labelled with the project the
//! repository is currently linked to. Hours in the development and beta
//! phases are capitalizable; everything else is expensed.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;

use dt_core::{DateRange, ProjectMapping, ProjectPhase};
use dt_db::Database;

const HEADER: &str =
    "Date,Project,Phase,Hours,Commits,Lines Added,Lines Deleted,Capitalizable";

struct ExportRow {
    date: String,
    project: String,
    phase: Option<ProjectPhase>,
    hours: f64,
    commits: i64,
    insertions: i64,
    deletions: i64,
}

impl ExportRow {
    fn capitalizable(&self) -> bool {
        self.phase.is_some_and(|phase| phase.is_capitalizable())
    }
}

pub fn run<W: Write>(writer: &mut W, db: &Database, range: DateRange) -> Result<()> {
    let mappings: HashMap<String, ProjectMapping> = db
        .list_project_mappings()?
        .into_iter()
        .map(|m| (m.repo_path.clone(), m))
        .collect();

    let mut rows: Vec<ExportRow> = db
        .summaries(range, None)?
        .into_iter()
        .map(|summary| {
            let mapping = mappings.get(&summary.repo_path);
            ExportRow {
                date: summary.date.to_string(),
                project: mapping.map_or_else(|| "Unlinked".to_string(), |m| m.display_name.clone()),
                phase: mapping.map(|m| m.phase),
                hours: summary.total_dev_hours,
                commits: summary.total_commits,
                insertions: summary.total_insertions,
                deletions: summary.total_deletions,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.project.cmp(&b.project)));

    writeln!(writer, "{HEADER}")?;
    for row in &rows {
        writeln!(
            writer,
            "{},{},{},{:.2},{},{},{},{}",
            row.date,
            escape_csv_field(&row.project),
            row.phase.map_or("unknown", |phase| phase.as_str()),
            row.hours,
            row.commits,
            row.insertions,
            row.deletions,
            if row.capitalizable() { "Yes" } else { "No" }
        )?;
    }

    if rows.is_empty() {
        return Ok(());
    }
    let total_hours: f64 = rows.iter().map(|r| r.hours).sum();
    let capitalizable_hours: f64 = rows
        .iter()
        .filter(|r| r.capitalizable())
        .map(|r| r.hours)
        .sum();
    writeln!(writer)?;
    writeln!(
        writer,
        "TOTALS,,,{total_hours:.2},{},{},{},",
        rows.iter().map(|r| r.commits).sum::<i64>(),
        rows.iter().map(|r| r.insertions).sum::<i64>(),
        rows.iter().map(|r| r.deletions).sum::<i64>()
    )?;
    writeln!(writer, "Capitalizable Hours,,,{capitalizable_hours:.2},,,,")?;
    writeln!(
        writer,
        "Expensed Hours,,,{:.2},,,,",
        total_hours - capitalizable_hours
    )?;
    Ok(())
}

/// Escape a CSV field per RFC 4180.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
