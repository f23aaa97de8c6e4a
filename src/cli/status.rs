//! # Status Command
//!
//! Shows what a sync would do without writing anything.

use anyhow::{Context, Result};

use envzip::observability::metrics;

use super::Workspace;

pub async fn status_command(workspace: &Workspace, show_metrics: bool) -> Result<()> {
    let status = workspace
        .orchestrator()
        .status()
        .await
        .context("Failed to compute sync status")?;

    println!("📊 envzip Status");
    println!("═══════════════");
    println!("Project: {}", status.project_id);
    println!("Stage: {}", status.stage);
    println!("Local file: {}", status.env_path.display());
    println!("Local variables: {}", status.local_count);
    println!("Remote variables: {}", status.remote_count);
    match status.last_synced_at {
        Some(at) => println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: Never"),
    }

    if status.in_sync() {
        println!("✅ In sync");
    } else {
        if status.pending_pull > 0 {
            println!("📥 {} change(s) to pull", status.pending_pull);
        }
        if status.pending_push > 0 {
            println!("📤 {} change(s) to push", status.pending_push);
        }
        if status.conflicts > 0 {
            println!("⚠️  {} potential conflict(s)", status.conflicts);
        }
    }

    if show_metrics {
        println!();
        print!("{}", metrics::render().context("Failed to render metrics")?);
    }
    Ok(())
}
