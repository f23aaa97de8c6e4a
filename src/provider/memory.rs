//! # In-Memory Store
//!
//! Ephemeral implementation of [`RemoteStore`] and [`VersionStore`].
//!
//! Used by the test suite and by anyone embedding the engine without a
//! server. Data does not persist across restarts. Thread-safe using
//! `Arc<RwLock>` so clones share the same state.
//!
//! Failures can be simulated with [`MemoryStore::set_offline`],
//! [`MemoryStore::fail_writes_for`] and [`MemoryStore::fail_version_writes`];
//! [`MemoryStore::hold_next_list`] pauses a pass at its remote read.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tracing::{debug, info};

use super::{RemoteEvent, RemoteEventKind, RemoteStore, Subscription, VersionStore};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{StoreError, StoreResult};
use crate::model::{Entry, EntryPatch, NewEntry, Stage, VersionRecord};

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    failing_keys: HashSet<String>,
    version_writes_fail: bool,
    list_gate: Option<Arc<Notify>>,
}

/// In-memory entry and version store
#[derive(Clone, Debug)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    /// Insertion order is creation order
    versions: Arc<RwLock<Vec<VersionRecord>>>,
    faults: Arc<RwLock<Faults>>,
    events: broadcast::Sender<RemoteEvent>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            versions: Arc::new(RwLock::new(Vec::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
            events,
        }
    }

    /// Simulate the store being unreachable
    pub async fn set_offline(&self, offline: bool) {
        self.faults.write().await.offline = offline;
    }

    /// Make every write touching `key` fail as unavailable
    pub async fn fail_writes_for(&self, key: &str) {
        self.faults.write().await.failing_keys.insert(key.to_string());
    }

    pub async fn clear_write_failures(&self) {
        self.faults.write().await.failing_keys.clear();
    }

    /// Make every version append fail
    pub async fn fail_version_writes(&self, fail: bool) {
        self.faults.write().await.version_writes_fail = fail;
    }

    /// Hold the next `list` call until the returned latch is notified
    pub async fn hold_next_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.faults.write().await.list_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Number of stored version records
    pub async fn version_count(&self) -> usize {
        self.versions.read().await.len()
    }

    async fn check_online(&self) -> StoreResult<()> {
        if self.faults.read().await.offline {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    async fn check_writable(&self, key: &str) -> StoreResult<()> {
        self.check_online().await?;
        if self.faults.read().await.failing_keys.contains(key) {
            return Err(StoreError::Unavailable(format!(
                "simulated write failure for '{key}'"
            )));
        }
        Ok(())
    }

    fn publish(&self, kind: RemoteEventKind, entry: &Entry) {
        // No receivers is not an error
        let _ = self.events.send(RemoteEvent {
            kind,
            entry: entry.clone(),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, project_id: &str, stage: Stage) -> StoreResult<Vec<Entry>> {
        let gate = self.faults.write().await.list_gate.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_online().await?;
        let entries = self.entries.read().await;
        let mut matching: Vec<Entry> = entries
            .values()
            .filter(|e| e.project_id == project_id && e.stage == stage)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matching)
    }

    async fn get(&self, entity_id: &str) -> StoreResult<Entry> {
        self.check_online().await?;
        self.entries
            .read()
            .await
            .get(entity_id)
            .cloned()
            .ok_or_else(|| StoreError::entry_not_found(entity_id))
    }

    async fn create(&self, new: NewEntry) -> StoreResult<Entry> {
        self.check_writable(&new.key).await?;
        let mut entries = self.entries.write().await;

        if entries
            .values()
            .any(|e| e.project_id == new.project_id && e.stage == new.stage && e.key == new.key)
        {
            return Err(StoreError::Rejected(format!(
                "key '{}' already exists in {}/{}",
                new.key, new.project_id, new.stage
            )));
        }

        let now = Utc::now();
        let entry = Entry {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: new.project_id,
            stage: new.stage,
            key: new.key,
            value: new.value,
            kind: new.kind,
            description: new.description,
            created_at: now,
            last_modified_at: now,
            last_modified_by: new.created_by,
        };
        entries.insert(entry.id.clone(), entry.clone());
        drop(entries);

        info!("  Created entry {} ({})", entry.key, entry.id);
        self.publish(RemoteEventKind::Create, &entry);
        Ok(entry)
    }

    async fn update(&self, entity_id: &str, patch: EntryPatch) -> StoreResult<Entry> {
        self.check_online().await?;
        let key = self
            .entries
            .read()
            .await
            .get(entity_id)
            .map(|e| e.key.clone())
            .ok_or_else(|| StoreError::entry_not_found(entity_id))?;
        self.check_writable(&key).await?;

        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(entity_id)
            .ok_or_else(|| StoreError::entry_not_found(entity_id))?;
        patch.apply_to(entry);
        entry.last_modified_at = Utc::now();
        if !patch.modified_by.is_empty() {
            entry.last_modified_by.clone_from(&patch.modified_by);
        }
        let updated = entry.clone();
        drop(entries);

        debug!("  Updated entry {} ({})", updated.key, updated.id);
        self.publish(RemoteEventKind::Update, &updated);
        Ok(updated)
    }

    async fn delete(&self, entity_id: &str) -> StoreResult<()> {
        self.check_online().await?;
        let key = self
            .entries
            .read()
            .await
            .get(entity_id)
            .map(|e| e.key.clone())
            .ok_or_else(|| StoreError::entry_not_found(entity_id))?;
        self.check_writable(&key).await?;

        let removed = self.entries.write().await.remove(entity_id);
        match removed {
            Some(entry) => {
                info!("  Deleted entry {} ({})", entry.key, entry.id);
                self.publish(RemoteEventKind::Delete, &entry);
                Ok(())
            }
            None => Err(StoreError::entry_not_found(entity_id)),
        }
    }

    async fn subscribe(&self, project_id: &str) -> StoreResult<Subscription> {
        self.check_online().await?;
        let mut source = self.events.subscribe();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let project_id = project_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) if event.entry.project_id == project_id => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, Some(task)))
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn append(&self, record: VersionRecord) -> StoreResult<VersionRecord> {
        self.check_online().await?;
        if self.faults.read().await.version_writes_fail {
            return Err(StoreError::Unavailable(
                "simulated version write failure".into(),
            ));
        }
        self.versions.write().await.push(record.clone());
        Ok(record)
    }

    async fn latest_version_number(&self, entity_id: &str) -> StoreResult<Option<u32>> {
        self.check_online().await?;
        Ok(self
            .versions
            .read()
            .await
            .iter()
            .filter(|v| v.entity_id == entity_id)
            .map(|v| v.version_number)
            .max())
    }

    async fn get_version(&self, version_id: &str) -> StoreResult<VersionRecord> {
        self.check_online().await?;
        self.versions
            .read()
            .await
            .iter()
            .find(|v| v.id == version_id)
            .cloned()
            .ok_or_else(|| StoreError::version_not_found(version_id))
    }

    async fn list_for_entity(&self, entity_id: &str) -> StoreResult<Vec<VersionRecord>> {
        self.check_online().await?;
        Ok(self
            .versions
            .read()
            .await
            .iter()
            .filter(|v| v.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn list_for_project(
        &self,
        project_id: &str,
        stage: Option<Stage>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<VersionRecord>> {
        self.check_online().await?;
        let versions = self.versions.read().await;
        // Newest insertion first; the stable sort keeps that order for equal timestamps
        let mut matching: Vec<VersionRecord> = versions
            .iter()
            .rev()
            .filter(|v| v.project_id == project_id && stage.is_none_or(|s| v.stage == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store
            .create(NewEntry::new("p", Stage::Development, "A", "1", "alice"))
            .await
            .unwrap();
        let err = store
            .create(NewEntry::new("p", Stage::Development, "A", "2", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));

        // Same key in another stage is a different entry
        store
            .create(NewEntry::new("p", Stage::Production, "A", "2", "alice"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_refreshes_metadata() {
        let store = MemoryStore::new();
        let created = store
            .create(NewEntry::new("p", Stage::Staging, "A", "1", "alice"))
            .await
            .unwrap();
        let mut patch = EntryPatch::value("2");
        patch.modified_by = "bob".into();
        let updated = store.update(&created.id, patch).await.unwrap();
        assert_eq!(updated.value, "2");
        assert_eq!(updated.last_modified_by, "bob");
        assert!(updated.last_modified_at >= created.last_modified_at);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true).await;
        let err = store.list("p", Stage::Staging).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_project() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("p1").await.unwrap();

        store
            .create(NewEntry::new("p2", Stage::Staging, "OTHER", "x", "alice"))
            .await
            .unwrap();
        let created = store
            .create(NewEntry::new("p1", Stage::Staging, "MINE", "y", "alice"))
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, RemoteEventKind::Create);
        assert_eq!(event.entry.id, created.id);
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_not_found() {
        let store = MemoryStore::new();
        let err = RemoteStore::delete(&store, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "entry", .. }));
    }
}
