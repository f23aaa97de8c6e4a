//! # Entry Service
//!
//! The single mutation path for remote entries. Sync, rollback and the CLI
//! all create, update and delete through here so every successful mutation
//! is followed by a version record.
//!
//! The record is written after the mutation. If that second write fails the
//! mutation still stands and the failure is returned as a history warning.

use std::sync::Arc;
use tracing::warn;

use super::ledger::VersionLedger;
use crate::error::{SyncError, SyncResult};
use crate::model::{Entry, EntryPatch, NewEntry, VersionRecord};
use crate::provider::RemoteStore;

/// Who is making changes; recorded as the author of version records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub author: String,
}

impl Session {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
        }
    }
}

/// Outcome of a successful mutation
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    pub value: T,
    /// `None` when nothing tracked changed or recording failed
    pub version: Option<VersionRecord>,
    /// Set when the mutation succeeded but its history could not be recorded
    pub history_warning: Option<String>,
}

impl<T> Mutation<T> {
    fn recorded(value: T, outcome: SyncResult<Option<VersionRecord>>) -> Self {
        match outcome {
            Ok(version) => Self {
                value,
                version,
                history_warning: None,
            },
            Err(e) => Self {
                value,
                version: None,
                history_warning: Some(e.to_string()),
            },
        }
    }
}

/// Entry mutations with best-effort history recording
#[derive(Clone)]
pub struct EntryService {
    remote: Arc<dyn RemoteStore>,
    ledger: VersionLedger,
}

impl std::fmt::Debug for EntryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryService").finish_non_exhaustive()
    }
}

impl EntryService {
    pub fn new(remote: Arc<dyn RemoteStore>, ledger: VersionLedger) -> Self {
        Self { remote, ledger }
    }

    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    #[must_use]
    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    pub async fn create(&self, session: &Session, mut new: NewEntry) -> SyncResult<Mutation<Entry>> {
        new.created_by.clone_from(&session.author);
        let entry = self.remote.create(new).await?;
        let outcome = self
            .ledger
            .record_create(&entry, &session.author)
            .await
            .map(Some);
        Ok(Self::finish(entry, outcome))
    }

    /// Update an entry by id, fetching its current state first
    pub async fn update(
        &self,
        session: &Session,
        entity_id: &str,
        patch: EntryPatch,
    ) -> SyncResult<Mutation<Entry>> {
        let current = self.remote.get(entity_id).await?;
        self.update_from(session, &current, patch).await
    }

    /// Update an entry whose current state the caller already holds
    pub async fn update_from(
        &self,
        session: &Session,
        current: &Entry,
        mut patch: EntryPatch,
    ) -> SyncResult<Mutation<Entry>> {
        patch.modified_by.clone_from(&session.author);
        let updated = self.remote.update(&current.id, patch).await?;
        let outcome = self
            .ledger
            .record_update(current, &updated, &session.author)
            .await;
        Ok(Self::finish(updated, outcome))
    }

    /// Delete an entry by id
    pub async fn delete(&self, session: &Session, entity_id: &str) -> SyncResult<Mutation<Entry>> {
        let current = self.remote.get(entity_id).await?;
        self.delete_entry(session, current).await
    }

    /// Delete an entry whose final state the caller already holds
    pub async fn delete_entry(
        &self,
        session: &Session,
        entry: Entry,
    ) -> SyncResult<Mutation<Entry>> {
        self.remote.delete(&entry.id).await?;
        let outcome = self
            .ledger
            .record_delete(&entry, &session.author)
            .await
            .map(Some);
        Ok(Self::finish(entry, outcome))
    }

    fn finish<T>(value: T, outcome: SyncResult<Option<VersionRecord>>) -> Mutation<T> {
        if let Err(SyncError::VersionRecord(reason)) = &outcome {
            warn!("Change applied but history not recorded: {}", reason);
        }
        Mutation::recorded(value, outcome)
    }
}
