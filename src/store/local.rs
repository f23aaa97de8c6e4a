//! # Local Store
//!
//! Reads and writes the local env file as a key → value mapping.
//!
//! This is the only writer of the env file. Writes go through the
//! merge-preserving serializer and are atomic: the new contents land in a
//! sibling temp file which is then renamed over the original, keeping its
//! permissions.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs::Permissions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::constants::PRIVATE_FILE_MODE;

use crate::error::{SyncError, SyncResult};
use crate::model::Snapshot;
use crate::parser;

/// Pending writes for the local file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalWriteSet {
    pub upserts: Snapshot,
    pub removals: BTreeSet<String>,
}

impl LocalWriteSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts.len() + self.removals.len()
    }
}

/// Handle on the local env file
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current file contents; a missing file reads as empty
    pub async fn read_text(&self) -> SyncResult<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Read the file as a snapshot
    pub async fn read(&self) -> SyncResult<Snapshot> {
        let text = self.read_text().await?;
        Ok(parser::parse(&text))
    }

    /// Last modification time, used by the most-recent-wins conflict policy
    pub async fn modified_at(&self) -> SyncResult<Option<DateTime<Utc>>> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.modified().ok().map(DateTime::<Utc>::from)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Merge the write set into the file, keeping comments and layout
    pub async fn write(&self, changes: &LocalWriteSet) -> SyncResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let existing = self.read_text().await?;
        let updated =
            parser::serialize_with_removals(&existing, &changes.upserts, &changes.removals);
        self.replace(&updated).await?;

        debug!(
            "Wrote {} upserts and {} removals to {}",
            changes.upserts.len(),
            changes.removals.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Create the file with `content` unless it already exists
    ///
    /// Returns true when the file was created.
    pub async fn create_if_missing(&self, content: &str) -> SyncResult<bool> {
        if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| self.io_error(source))?
        {
            return Ok(false);
        }
        self.replace(content).await?;
        Ok(true)
    }

    async fn replace(&self, content: &str) -> SyncResult<()> {
        write_atomic(&self.path, content.as_bytes())
            .await
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::LocalFile {
            path: self.path.clone(),
            source,
        }
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`
///
/// A symlinked `path` is resolved first so the link keeps pointing at the
/// updated file. The replacement keeps the permissions of the file it
/// replaces; new files are created with [`PRIVATE_FILE_MODE`].
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let target = match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };
    let permissions = match tokio::fs::metadata(&target).await {
        Ok(metadata) => Some(metadata.permissions()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = target.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let written = match write_new_file(&tmp_path, bytes, permissions).await {
        Ok(()) => tokio::fs::rename(&tmp_path, &target).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    written
}

async fn write_new_file(
    path: &Path,
    bytes: &[u8],
    permissions: Option<Permissions>,
) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(PRIVATE_FILE_MODE);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    if let Some(permissions) = permissions {
        file.set_permissions(permissions).await?;
    }
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join(".env"));
        assert!(store.read().await.unwrap().is_empty());
        assert!(store.modified_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_merges_into_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        tokio::fs::write(&path, "# app\nA=1\nB=2\n").await.unwrap();

        let store = LocalStore::new(&path);
        let mut changes = LocalWriteSet::default();
        changes.upserts.insert("A".into(), "one".into());
        changes.upserts.insert("C".into(), "hello world".into());
        changes.removals.insert("B".into());
        store.write(&changes).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, "# app\nA=one\nC=\"hello world\"");

        let snapshot = store.read().await.unwrap();
        assert_eq!(snapshot.get("C").map(String::as_str), Some("hello world"));
        assert!(!snapshot.contains_key("B"));
    }

    #[tokio::test]
    async fn test_create_if_missing_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let store = LocalStore::new(&path);

        assert!(store.create_if_missing("# first\n").await.unwrap());
        assert!(!store.create_if_missing("# second\n").await.unwrap());
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, "# first\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_keeps_permissions_and_symlink() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("shared.env");
        let link = dir.path().join(".env");
        tokio::fs::write(&real, "A=1\n").await.unwrap();
        tokio::fs::set_permissions(&real, Permissions::from_mode(0o640))
            .await
            .unwrap();
        tokio::fs::symlink(&real, &link).await.unwrap();

        let mut changes = LocalWriteSet::default();
        changes.upserts.insert("A".into(), "2".into());
        LocalStore::new(&link).write(&changes).await.unwrap();

        let link_meta = tokio::fs::symlink_metadata(&link).await.unwrap();
        assert!(link_meta.file_type().is_symlink());
        let mode = tokio::fs::metadata(&real).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(tokio::fs::read_to_string(&real).await.unwrap(), "A=2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        LocalStore::new(&path).create_if_missing("A=1").await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, PRIVATE_FILE_MODE);
    }

    #[tokio::test]
    async fn test_empty_write_set_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        tokio::fs::write(&path, "A=1\n").await.unwrap();

        LocalStore::new(&path)
            .write(&LocalWriteSet::default())
            .await
            .unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, "A=1\n");
    }
}
