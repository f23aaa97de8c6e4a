//! # Rollback Command
//!
//! Restores a field or a whole variable to an earlier version. The rollback
//! is itself recorded as a new version.

use anyhow::{Context, Result};

use super::Workspace;

pub async fn rollback_command(
    workspace: &Workspace,
    version_id: &str,
    field: Option<&str>,
) -> Result<()> {
    let engine = workspace.rollback();
    let mutation = match field {
        Some(field) => {
            println!("⏪ Rolling back {field} to before version {version_id}...");
            engine
                .rollback_field(&workspace.session, version_id, field)
                .await
                .with_context(|| format!("Failed to roll back {field}"))?
        }
        None => {
            println!("⏪ Rolling back to version {version_id}...");
            engine
                .rollback_entity(&workspace.session, version_id)
                .await
                .context("Failed to roll back")?
        }
    };

    let entry = &mutation.value;
    match &mutation.version {
        Some(version) => println!(
            "✅ {} restored as version {}",
            entry.key, version.version_number
        ),
        None => println!("✅ {} already matched that version", entry.key),
    }
    if let Some(warning) = &mutation.history_warning {
        println!("⚠️  History not recorded: {warning}");
    }
    println!("Run \"envzip pull\" to update the local file.");
    Ok(())
}

pub async fn preview_command(workspace: &Workspace, version_id: &str) -> Result<()> {
    let state = workspace
        .rollback()
        .preview(version_id)
        .await
        .with_context(|| format!("Failed to reconstruct version {version_id}"))?;

    match state {
        Some(fields) => {
            println!("State after version {version_id}:");
            println!("  key: {}", fields.key);
            println!("  value: {}", fields.value);
            println!("  type: {}", fields.kind);
            println!("  stage: {}", fields.stage);
            if let Some(description) = &fields.description {
                println!("  description: {description}");
            }
        }
        None => println!("The variable was deleted by version {version_id}"),
    }
    Ok(())
}
