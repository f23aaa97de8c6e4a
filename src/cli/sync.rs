//! # Sync Commands
//!
//! `pull`, `push` and `sync`: one reconciliation pass restricted to the
//! requested direction.

use anyhow::{Context, Result};

use envzip::controller::reconciler::{Direction, SyncMode};
use envzip::controller::{SyncOutcome, SyncReport, TriggerSource};

use super::Workspace;

pub async fn sync_command(workspace: &Workspace, mode: SyncMode) -> Result<()> {
    match mode {
        SyncMode::Pull => println!("📥 Pulling environment variables..."),
        SyncMode::Push => println!("📤 Pushing environment variables..."),
        SyncMode::Both => println!("🔄 Syncing environment variables..."),
    }

    let orchestrator = workspace.orchestrator();
    let outcome = orchestrator
        .sync(mode, TriggerSource::Manual)
        .await
        .context("Sync failed")?;

    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        // Only reachable if another pass shares this orchestrator
        SyncOutcome::Coalesced => {
            println!("ℹ️  A sync is already running");
            return Ok(());
        }
    };

    print_report(&report);

    if !report.result.failed.is_empty() {
        anyhow::bail!(
            "{} variable(s) could not be synced; run the command again to retry",
            report.result.failed.len()
        );
    }
    Ok(())
}

pub fn print_report(report: &SyncReport) {
    let result = &report.result;
    if report.is_noop() && result.deferred.is_empty() {
        println!("ℹ️  Already up to date ({} variables)", result.unchanged);
        return;
    }

    let pulled = result.pulls().count();
    let pushed = result.pushes().count();
    if pulled > 0 {
        println!("✅ Pulled {pulled} variable(s)");
    }
    if pushed > 0 {
        println!("✅ Pushed {pushed} variable(s)");
    }
    for change in &result.applied {
        let arrow = match change.direction {
            Direction::Pull => "←",
            Direction::Push => "→",
        };
        match &change.value {
            Some(_) => println!("   {arrow} {}", change.key),
            None => println!("   {arrow} {} (removed)", change.key),
        }
    }

    if !result.conflicts.is_empty() {
        println!(
            "⚠️  {} conflict(s) detected and resolved",
            result.conflicts.len()
        );
        for conflict in &result.conflicts {
            println!(
                "   {}: kept {} value, discarded {:?}",
                conflict.key,
                if conflict.winner == Direction::Pull {
                    "remote"
                } else {
                    "local"
                },
                conflict.discarded_value().unwrap_or("<absent>")
            );
        }
    }

    if !result.deferred.is_empty() {
        println!(
            "ℹ️  {} change(s) left for the other direction",
            result.deferred.len()
        );
    }

    for failed in &result.failed {
        println!("❌ {} ({}): {}", failed.key, failed.direction, failed.reason);
    }

    for warning in &report.history_warnings {
        println!("⚠️  History not recorded for {warning}");
    }
}
