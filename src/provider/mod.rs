//! # Provider Modules
//!
//! Interfaces to the remote side and their implementations.
//!
//! - [`RemoteStore`]: authoritative entry storage per project/stage
//! - [`VersionStore`]: append-only storage for version records
//!
//! Both are async traits so the sync engine can run against the REST adapter
//! in production and the in-memory store in tests.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreResult;
use crate::model::{Entry, EntryPatch, NewEntry, Stage, VersionRecord};

pub mod memory;
pub mod rest;

/// Remote store holding the authoritative entries
///
/// Only single-entry atomic updates are assumed; there are no multi-key transactions.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All entries of a project/stage
    async fn list(&self, project_id: &str, stage: Stage) -> StoreResult<Vec<Entry>>;

    /// A single entry by id
    async fn get(&self, entity_id: &str) -> StoreResult<Entry>;

    /// Create an entry; the store assigns id and timestamps
    async fn create(&self, entry: NewEntry) -> StoreResult<Entry>;

    /// Apply a partial update; the store refreshes `last_modified_at`
    async fn update(&self, entity_id: &str, patch: EntryPatch) -> StoreResult<Entry>;

    async fn delete(&self, entity_id: &str) -> StoreResult<()>;

    /// Stream of change events for a project; dropping the subscription unsubscribes
    async fn subscribe(&self, project_id: &str) -> StoreResult<Subscription>;
}

/// Storage for version records
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn append(&self, record: VersionRecord) -> StoreResult<VersionRecord>;

    /// Highest version number recorded for an entity, if any
    async fn latest_version_number(&self, entity_id: &str) -> StoreResult<Option<u32>>;

    async fn get_version(&self, version_id: &str) -> StoreResult<VersionRecord>;

    async fn list_for_entity(&self, entity_id: &str) -> StoreResult<Vec<VersionRecord>>;

    /// Records of a project, newest first, optionally limited to one stage
    async fn list_for_project(
        &self,
        project_id: &str,
        stage: Option<Stage>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<VersionRecord>>;
}

/// What happened to an entry on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEventKind {
    Create,
    Update,
    Delete,
}

impl RemoteEventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteEventKind::Create => "create",
            RemoteEventKind::Update => "update",
            RemoteEventKind::Delete => "delete",
        }
    }
}

/// Change notification delivered through a [`Subscription`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    pub kind: RemoteEventKind,
    pub entry: Entry,
}

/// Live subscription to remote change events
///
/// The feeding task is aborted on [`unsubscribe`](Self::unsubscribe) or drop.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<RemoteEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    #[must_use]
    pub fn new(events: mpsc::Receiver<RemoteEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next event, or `None` once the feed has ended
    pub async fn recv(&mut self) -> Option<RemoteEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
