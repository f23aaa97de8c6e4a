//! # History Command
//!
//! Lists version records for the configured stage, or for a single key, and
//! prints project-wide version statistics.

use anyhow::{Context, Result};
use std::collections::HashMap;

use envzip::model::{FieldChange, VersionRecord};

use super::Workspace;

pub async fn history_command(
    workspace: &Workspace,
    key: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let config = &workspace.config;
    let limit = limit.unwrap_or(workspace.runtime.history_limit);
    let ledger = workspace.entries.ledger();

    let current = workspace
        .entries
        .remote()
        .list(&config.project_key, config.stage)
        .await
        .context("Failed to list remote variables")?;
    let mut names: HashMap<String, String> = current
        .iter()
        .map(|e| (e.id.clone(), e.key.clone()))
        .collect();

    let records = match key {
        Some(key) => {
            let entry = current.iter().find(|e| e.key == key).with_context(|| {
                format!("No variable named {key} in {} ({})", config.project_key, config.stage)
            })?;
            println!("📜 History for {key}");
            let mut records = ledger
                .history(&entry.id)
                .await
                .with_context(|| format!("Failed to load history for {key}"))?;
            records.truncate(limit);
            records
        }
        None => {
            println!("📜 History for {} ({})", config.project_key, config.stage);
            ledger
                .history_for_stage(&config.project_key, config.stage, limit)
                .await
                .context("Failed to load history")?
        }
    };
    println!();

    if records.is_empty() {
        println!("No history recorded yet");
        return Ok(());
    }

    // Deleted entries are only named by their created/deleted records
    for record in &records {
        for change in &record.changes {
            if let FieldChange::Created { fields } | FieldChange::Deleted { fields } = change {
                names
                    .entry(record.entity_id.clone())
                    .or_insert_with(|| fields.key.clone());
            }
        }
    }

    for record in &records {
        let name = names
            .get(&record.entity_id)
            .map_or("<unknown>", String::as_str);
        print_record(name, record);
    }
    Ok(())
}

pub async fn stats_command(workspace: &Workspace) -> Result<()> {
    let stats = workspace
        .entries
        .ledger()
        .statistics(&workspace.config.project_key)
        .await
        .context("Failed to load version statistics")?;

    println!("📊 Version statistics for {}", workspace.config.project_key);
    println!("Total versions: {}", stats.total_versions);
    for (stage, count) in &stats.versions_by_stage {
        println!("  {stage}: {count}");
    }
    println!(
        "Changes: {} created, {} modified, {} deleted",
        stats.change_types.created, stats.change_types.modified, stats.change_types.deleted
    );

    if !stats.recent_activity.is_empty() {
        println!();
        println!("Recent activity:");
        for record in &stats.recent_activity {
            println!(
                "  {}  v{}  {}  {}",
                record.created_at.format("%Y-%m-%d %H:%M"),
                record.version_number,
                record.author,
                record.id
            );
        }
    }
    Ok(())
}

fn print_record(name: &str, record: &VersionRecord) {
    println!(
        "{name} v{}  {}  by {}  [{}]",
        record.version_number,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.author,
        record.id
    );
    if let Some(message) = &record.message {
        println!("    {message}");
    }
    for change in &record.changes {
        match change {
            FieldChange::Created { fields } => {
                println!("    + created ({}, {})", fields.kind, fields.stage);
            }
            FieldChange::Modified { field, .. } => {
                println!("    ~ {field} changed");
            }
            FieldChange::Deleted { .. } => println!("    - deleted"),
        }
    }
}
