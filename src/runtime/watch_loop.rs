//! # Watch Loop
//!
//! Keeps the env file in sync until stopped.
//!
//! Triggers come from the debounced [`FileWatcher`] and, when following the
//! remote side, from the remote subscription (events for other stages of the
//! project are ignored). Each trigger runs a full pass on its own task so the
//! loop keeps listening; triggers arriving while a pass is in flight are
//! coalesced into one follow-up pass once it finishes.
//!
//! [`WatchHandle::stop`] lets an in-flight pass complete and starts no new one.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::watcher::FileWatcher;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::controller::orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport, TriggerSource};
use crate::controller::reconciler::SyncMode;
use crate::error::SyncResult;
use crate::provider::{RemoteEvent, Subscription};

/// Outcome of a pass run by the watch loop
#[derive(Debug, Clone)]
pub enum WatchUpdate {
    Synced(SyncReport),
    Failed(String),
}

/// Handle on a running watch loop
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: watch::Sender<bool>,
    updates: mpsc::Receiver<WatchUpdate>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Next pass outcome; `None` once the loop has exited
    pub async fn next_update(&mut self) -> Option<WatchUpdate> {
        self.updates.recv().await
    }

    /// Stop watching and wait for any in-flight pass to finish
    pub async fn stop(self) {
        // Err means the loop already exited
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Watch loop task failed: {}", e);
        }
        info!("Stopped watching");
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Quiet period merging bursts of file events
    pub debounce: Duration,
    /// Also sync on remote change events (`envzip watch --dashboard`)
    pub follow_remote: bool,
}

/// Start watching the orchestrator's env file, and optionally its remote project
///
/// An initial pass runs immediately. If the remote subscription cannot be
/// opened, watching continues on file changes alone.
pub async fn start_watching(
    orchestrator: Arc<SyncOrchestrator>,
    options: WatchOptions,
) -> SyncResult<WatchHandle> {
    let files = FileWatcher::start(&orchestrator.target().env_path, options.debounce)?;

    let remote = if options.follow_remote {
        match orchestrator
            .entries()
            .remote()
            .subscribe(&orchestrator.target().project_id)
            .await
        {
            Ok(subscription) => {
                info!("Following remote changes");
                Some(subscription)
            }
            Err(e) => {
                warn!("Remote change feed unavailable, watching local file only: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (shutdown, shutdown_rx) = watch::channel(false);
    let (updates_tx, updates) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(run_watch_loop(
        orchestrator,
        files,
        remote,
        shutdown_rx,
        updates_tx,
    ));

    Ok(WatchHandle {
        shutdown,
        updates,
        task,
    })
}

async fn run_watch_loop(
    orchestrator: Arc<SyncOrchestrator>,
    mut files: FileWatcher,
    mut remote: Option<Subscription>,
    mut shutdown: watch::Receiver<bool>,
    updates: mpsc::Sender<WatchUpdate>,
) {
    let stage = orchestrator.target().stage;
    info!(
        "Watching {} for project {} ({})",
        files.path().display(),
        orchestrator.target().project_id,
        stage
    );

    let mut in_flight = Some(spawn_pass(&orchestrator, TriggerSource::Startup, &updates));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Shutdown requested, exiting watch loop");
                break;
            }
            changed = files.changed() => match changed {
                Some(()) => trigger(&orchestrator, &mut in_flight, TriggerSource::LocalFile, &updates),
                None => {
                    warn!("File watcher stopped, exiting watch loop");
                    break;
                }
            },
            event = next_remote_event(&mut remote) => match event {
                Some(event) if event.entry.stage == stage => {
                    debug!("Remote {} of {}", event.kind.as_str(), event.entry.key);
                    trigger(&orchestrator, &mut in_flight, TriggerSource::Remote, &updates);
                }
                Some(_) => {}
                None => {
                    warn!("Remote change feed ended, watching local file only");
                    remote = None;
                }
            },
            () = pass_finished(&mut in_flight) => {
                in_flight = None;
                if orchestrator.take_rerun() {
                    in_flight = Some(spawn_pass(&orchestrator, TriggerSource::Rerun, &updates));
                }
            }
        }
    }

    if let Some(task) = in_flight {
        info!("Waiting for in-flight sync to finish");
        if let Err(e) = task.await {
            error!("Sync task failed: {}", e);
        }
    }
    if let Some(subscription) = remote {
        subscription.unsubscribe();
    }
}

fn trigger(
    orchestrator: &Arc<SyncOrchestrator>,
    in_flight: &mut Option<JoinHandle<()>>,
    source: TriggerSource,
    updates: &mpsc::Sender<WatchUpdate>,
) {
    if in_flight.is_some() {
        orchestrator.coalesce();
    } else {
        *in_flight = Some(spawn_pass(orchestrator, source, updates));
    }
}

fn spawn_pass(
    orchestrator: &Arc<SyncOrchestrator>,
    trigger: TriggerSource,
    updates: &mpsc::Sender<WatchUpdate>,
) -> JoinHandle<()> {
    let orchestrator = Arc::clone(orchestrator);
    let updates = updates.clone();
    tokio::spawn(async move {
        let update = match orchestrator.sync(SyncMode::Both, trigger).await {
            Ok(SyncOutcome::Completed(report)) => WatchUpdate::Synced(report),
            Ok(SyncOutcome::Coalesced) => return,
            Err(e) => {
                error!("Sync triggered by {} failed: {}", trigger, e);
                WatchUpdate::Failed(e.to_string())
            }
        };
        if updates.try_send(update).is_err() {
            debug!("No listener for watch updates, dropping one");
        }
    })
}

async fn next_remote_event(remote: &mut Option<Subscription>) -> Option<RemoteEvent> {
    match remote {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn pass_finished(in_flight: &mut Option<JoinHandle<()>>) {
    match in_flight {
        Some(task) => {
            if let Err(e) = task.await {
                error!("Sync task failed: {}", e);
            }
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::entries::{EntryService, Session};
    use crate::controller::ledger::VersionLedger;
    use crate::controller::orchestrator::SyncTarget;
    use crate::model::{NewEntry, Stage};
    use crate::provider::memory::MemoryStore;
    use crate::provider::RemoteStore;

    fn orchestrator(store: &MemoryStore, dir: &std::path::Path) -> Arc<SyncOrchestrator> {
        let ledger = VersionLedger::new(Arc::new(store.clone()));
        let entries = EntryService::new(Arc::new(store.clone()), ledger);
        let target = SyncTarget {
            project_id: "p".into(),
            stage: Stage::Development,
            env_path: dir.join(".env"),
        };
        Arc::new(SyncOrchestrator::new(entries, target, Session::new("alice")))
    }

    fn options() -> WatchOptions {
        WatchOptions {
            debounce: Duration::from_millis(20),
            follow_remote: true,
        }
    }

    async fn next_synced(handle: &mut WatchHandle) -> SyncReport {
        loop {
            let update = tokio::time::timeout(Duration::from_secs(5), handle.next_update())
                .await
                .unwrap()
                .unwrap();
            if let WatchUpdate::Synced(report) = update {
                return report;
            }
        }
    }

    #[tokio::test]
    async fn test_initial_pass_then_remote_change_is_pulled() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let orchestrator = orchestrator(&store, dir.path());
        tokio::fs::write(&orchestrator.target().env_path, "A=1\n")
            .await
            .unwrap();

        let mut handle = start_watching(Arc::clone(&orchestrator), options())
            .await
            .unwrap();
        let first = next_synced(&mut handle).await;
        assert_eq!(first.trigger, TriggerSource::Startup);

        store
            .create(NewEntry::new("p", Stage::Development, "B", "2", "bob"))
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let local = orchestrator.local().read().await.unwrap();
            if local.get("B").map(String::as_str) == Some("2") {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "remote change not pulled");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        handle.stop().await;
        assert!(!orchestrator.is_syncing());
    }

    #[tokio::test]
    async fn test_other_stage_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let orchestrator = orchestrator(&store, dir.path());

        let mut handle = start_watching(Arc::clone(&orchestrator), options())
            .await
            .unwrap();
        next_synced(&mut handle).await;

        store
            .create(NewEntry::new("p", Stage::Production, "B", "2", "bob"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let local = orchestrator.local().read().await.unwrap();
        assert!(!local.contains_key("B"));

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_local_edit_is_pushed_without_following_remote() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let orchestrator = orchestrator(&store, dir.path());
        let options = WatchOptions {
            follow_remote: false,
            ..options()
        };

        let mut handle = start_watching(Arc::clone(&orchestrator), options)
            .await
            .unwrap();
        next_synced(&mut handle).await;

        tokio::fs::write(&orchestrator.target().env_path, "NEW=1\n")
            .await
            .unwrap();
        let report = next_synced(&mut handle).await;
        assert!(matches!(
            report.trigger,
            TriggerSource::LocalFile | TriggerSource::Rerun
        ));
        assert_eq!(report.result.pushes().count(), 1);

        handle.stop().await;
    }
}
