//! # Watch Command
//!
//! Syncs on every change to the env file until Ctrl+C. With `--dashboard`
//! remote edits made elsewhere (for example in the web dashboard) are pulled
//! as they happen.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use envzip::runtime::{start_watching, WatchOptions, WatchUpdate};

use super::sync::print_report;
use super::Workspace;

pub async fn watch_command(workspace: &Workspace, dashboard: bool) -> Result<()> {
    println!("👀 Starting watch mode...");
    if dashboard {
        println!("📡 Realtime dashboard sync enabled");
    }

    let orchestrator = Arc::new(workspace.orchestrator());
    let options = WatchOptions {
        debounce: workspace.runtime.watch_debounce(),
        follow_remote: dashboard,
    };
    let mut handle = start_watching(orchestrator, options)
        .await
        .context("Failed to start watching")?;

    println!("✅ Watching for changes. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Received shutdown signal, stopping watch mode");
                println!();
                println!("🛑 Stopping watchers...");
                break;
            }
            update = handle.next_update() => match update {
                Some(WatchUpdate::Synced(report)) => {
                    if !report.is_noop() {
                        println!("[{}] {}", report.synced_at.format("%H:%M:%S"), report.trigger);
                        print_report(&report);
                    }
                }
                Some(WatchUpdate::Failed(reason)) => {
                    println!("❌ Sync failed: {reason}");
                }
                None => break,
            }
        }
    }

    handle.stop().await;
    Ok(())
}
