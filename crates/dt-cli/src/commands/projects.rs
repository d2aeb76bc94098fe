//! Repository to project links.

use std::io::Write;

use anyhow::{Context, Result};

use dt_core::{ProjectKey, ProjectMapping, ProjectPhase, repo_display_name};
use dt_db::Database;

/// Links `repo` to `project`, replacing any existing link.
pub fn link<W: Write>(
    writer: &mut W,
    db: &mut Database,
    repo: &str,
    project: &str,
    name: Option<&str>,
    phase: ProjectPhase,
) -> Result<()> {
    let mapping = ProjectMapping {
        repo_path: repo.to_string(),
        project_key: ProjectKey::new(project)?,
        display_name: name.unwrap_or_else(|| repo_display_name(repo)).to_string(),
        phase,
    };
    db.upsert_project_mapping(&mapping)
        .context("failed to link repository")?;
    writeln!(
        writer,
        "Linked {} to {} ({}, {})",
        mapping.repo_path, mapping.project_key, mapping.display_name, mapping.phase
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let mappings = db.list_project_mappings()?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&mappings)?)?;
        return Ok(());
    }

    if mappings.is_empty() {
        writeln!(writer, "No linked repositories.")?;
        writeln!(writer, "Hint: Run 'dt link --repo <path> --project <key>'.")?;
        return Ok(());
    }

    for mapping in &mappings {
        let capitalizable = if mapping.phase.is_capitalizable() {
            "capitalizable"
        } else {
            "expensed"
        };
        writeln!(
            writer,
            "{:<20} {:<12} {:<12} {:<14} {}",
            mapping.display_name,
            mapping.project_key.as_str(),
            mapping.phase.as_str(),
            capitalizable,
            mapping.repo_path
        )?;
    }
    Ok(())
}
