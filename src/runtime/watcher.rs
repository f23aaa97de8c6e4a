//! # File Watcher
//!
//! Debounced change notifications for the local env file.
//!
//! The parent directory is watched rather than the file itself: editors that
//! save by writing a temp file and renaming it over the original replace the
//! inode, and a watch on the file alone would go quiet after the first save.
//! Events for other files in the directory (including the baseline file) are
//! filtered out.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{SyncError, SyncResult};

/// Watches one file and yields once per burst of changes
pub struct FileWatcher {
    // Dropping the notify watcher closes the raw channel and ends the debounce task
    _watcher: RecommendedWatcher,
    changes: mpsc::Receiver<()>,
    path: PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Start watching `path`; bursts closer together than `debounce` are merged
    pub fn start(path: &Path, debounce: Duration) -> SyncResult<Self> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| SyncError::Watcher(format!("{} has no file name", path.display())))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if is_relevant(&event, &file_name) {
                        // Receiver gone means the watcher is shutting down
                        let _ = raw_tx.send(());
                    }
                }
                Err(e) => {
                    error!("Watch error: {:?}", e);
                }
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Started watching {}", path.display());

        let (tx, changes) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(debounce_events(raw_rx, tx, debounce));

        Ok(Self {
            _watcher: watcher,
            changes,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next debounced change; `None` once the watcher has stopped
    pub async fn changed(&mut self) -> Option<()> {
        self.changes.recv().await
    }
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Forward one notification per quiet period of `debounce`
async fn debounce_events(
    mut raw: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<()>,
    debounce: Duration,
) {
    while raw.recv().await.is_some() {
        let mut merged = 0usize;
        loop {
            match tokio::time::timeout(debounce, raw.recv()).await {
                Ok(Some(())) => merged += 1,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        debug!("Env file changed ({} events merged)", merged + 1);
        if tx.send(()).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_target_file_is_relevant() {
        let name = OsString::from(".env");
        assert!(is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/app/.env"),
            &name
        ));
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/app/.env"),
            &name
        ));
        assert!(!is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/app/.env.envzip-state.json"),
            &name
        ));
        assert!(!is_relevant(
            &event(EventKind::Access(notify::event::AccessKind::Any), "/app/.env"),
            &name
        ));
    }

    #[tokio::test]
    async fn test_burst_is_debounced_into_one_change() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(debounce_events(raw_rx, tx, Duration::from_millis(50)));

        for _ in 0..5 {
            raw_tx.send(()).unwrap();
        }
        assert_eq!(rx.recv().await, Some(()));

        drop(raw_tx);
        task.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watcher_sees_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut watcher = FileWatcher::start(&path, Duration::from_millis(50)).unwrap();

        tokio::fs::write(&path, "A=1\n").await.unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(5), watcher.changed())
            .await
            .unwrap();
        assert_eq!(changed, Some(()));
    }
}
