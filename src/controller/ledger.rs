//! # Version Ledger
//!
//! Append-only history of entry changes.
//!
//! Every remote mutation produces one [`VersionRecord`]:
//! - create → version 1 with a single `created` change holding the full field set
//! - update → one `modified` change per tracked field that differs; no record
//!   when nothing tracked changed
//! - delete → one `deleted` change holding the final field set
//!
//! Version numbers are `max + 1` per entity. Records are never rewritten and
//! outlive the entry they describe.
//!
//! Recording is a second write after the entry mutation, so a failure here
//! leaves a gap in history but never undoes the mutation. Callers receive a
//! [`SyncError::VersionRecord`] and downgrade it to a warning.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants::{
    MESSAGE_INITIAL_VERSION, MESSAGE_VARIABLE_DELETED, MESSAGE_VARIABLE_UPDATED,
    RECENT_ACTIVITY_LIMIT,
};
use crate::error::{SyncError, SyncResult};
use crate::model::{ChangeType, Entry, FieldChange, FieldSet, Stage, TrackedField, VersionRecord};
use crate::observability::metrics;
use crate::provider::VersionStore;

/// Counts of field changes by type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTypeCounts {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl ChangeTypeCounts {
    fn add(&mut self, change_type: ChangeType) {
        match change_type {
            ChangeType::Created => self.created += 1,
            ChangeType::Modified => self.modified += 1,
            ChangeType::Deleted => self.deleted += 1,
        }
    }
}

/// Aggregate view of a project's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatistics {
    pub total_versions: usize,
    pub versions_by_stage: BTreeMap<Stage, usize>,
    pub change_types: ChangeTypeCounts,
    /// Newest records first
    pub recent_activity: Vec<VersionRecord>,
}

/// Field-level diff between two entry states, in tracked-field order
#[must_use]
pub fn diff_fields(old: &FieldSet, new: &FieldSet) -> Vec<FieldChange> {
    TrackedField::ALL
        .into_iter()
        .filter_map(|field| {
            let old_value = field.read(old);
            let new_value = field.read(new);
            (old_value != new_value).then_some(FieldChange::Modified {
                field,
                old_value,
                new_value,
            })
        })
        .collect()
}

/// State after replaying `records` up to and including `version_number`
///
/// `None` when the entry did not exist at that point, or the stream lacks
/// the `created` record needed to start the replay.
#[must_use]
pub fn fold_forward(records: &[VersionRecord], version_number: u32) -> Option<FieldSet> {
    let mut ordered: Vec<&VersionRecord> = records
        .iter()
        .filter(|r| r.version_number <= version_number)
        .collect();
    ordered.sort_by_key(|r| r.version_number);

    let mut state: Option<FieldSet> = None;
    for record in ordered {
        for change in &record.changes {
            match change {
                FieldChange::Created { fields } => state = Some(fields.clone()),
                FieldChange::Modified {
                    field, new_value, ..
                } => {
                    if let Some(fields) = state.as_mut() {
                        field.write(fields, new_value.as_deref());
                    }
                }
                FieldChange::Deleted { .. } => state = None,
            }
        }
    }
    state
}

/// Rewind `current` to the state right after `version_number` by undoing
/// every newer `modified` change
///
/// Works even when older records are missing from the stream.
#[must_use]
pub fn rewind(current: &FieldSet, records: &[VersionRecord], version_number: u32) -> FieldSet {
    let mut newer: Vec<&VersionRecord> = records
        .iter()
        .filter(|r| r.version_number > version_number)
        .collect();
    newer.sort_by_key(|r| std::cmp::Reverse(r.version_number));

    let mut state = current.clone();
    for record in newer {
        for change in record.changes.iter().rev() {
            if let FieldChange::Modified {
                field, old_value, ..
            } = change
            {
                field.write(&mut state, old_value.as_deref());
            }
        }
    }
    state
}

/// Records and queries entry history
#[derive(Clone)]
pub struct VersionLedger {
    store: Arc<dyn VersionStore>,
}

impl std::fmt::Debug for VersionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionLedger").finish_non_exhaustive()
    }
}

impl VersionLedger {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    pub async fn record_create(&self, entry: &Entry, author: &str) -> SyncResult<VersionRecord> {
        let changes = vec![FieldChange::Created {
            fields: entry.tracked_fields(),
        }];
        self.append(entry, changes, author, MESSAGE_INITIAL_VERSION)
            .await
    }

    /// Record the tracked-field differences between two states of an entry
    ///
    /// Returns `None` without writing when nothing tracked changed.
    pub async fn record_update(
        &self,
        old: &Entry,
        new: &Entry,
        author: &str,
    ) -> SyncResult<Option<VersionRecord>> {
        let changes = diff_fields(&old.tracked_fields(), &new.tracked_fields());
        if changes.is_empty() {
            debug!("No tracked change on {}, skipping version record", new.key);
            return Ok(None);
        }
        self.append(new, changes, author, MESSAGE_VARIABLE_UPDATED)
            .await
            .map(Some)
    }

    pub async fn record_delete(&self, entry: &Entry, author: &str) -> SyncResult<VersionRecord> {
        let changes = vec![FieldChange::Deleted {
            fields: entry.tracked_fields(),
        }];
        self.append(entry, changes, author, MESSAGE_VARIABLE_DELETED)
            .await
    }

    async fn append(
        &self,
        entry: &Entry,
        changes: Vec<FieldChange>,
        author: &str,
        message: &str,
    ) -> SyncResult<VersionRecord> {
        let result = async {
            let latest = self.store.latest_version_number(&entry.id).await?;
            let version_number = latest.map_or(1, |n| n + 1);
            let record =
                VersionRecord::new(entry, version_number, changes, author, Some(message.into()));
            self.store.append(record).await
        }
        .await;

        match result {
            Ok(record) => {
                metrics::increment_versions_recorded();
                debug!(
                    "Recorded version {} of {} ({})",
                    record.version_number, entry.key, entry.id
                );
                Ok(record)
            }
            Err(e) => {
                metrics::increment_version_record_failures();
                warn!("Failed to record version for {}: {}", entry.key, e);
                Err(SyncError::VersionRecord(e.to_string()))
            }
        }
    }

    /// History of one entity, newest version first
    pub async fn history(&self, entity_id: &str) -> SyncResult<Vec<VersionRecord>> {
        let mut records = self.store.list_for_entity(entity_id).await?;
        records.sort_by_key(|r| std::cmp::Reverse(r.version_number));
        Ok(records)
    }

    /// Project history across stages, newest first, at most `limit` records
    pub async fn history_for_container(
        &self,
        project_id: &str,
        limit: usize,
    ) -> SyncResult<Vec<VersionRecord>> {
        Ok(self
            .store
            .list_for_project(project_id, None, Some(limit))
            .await?)
    }

    /// Project history for one stage, newest first, at most `limit` records
    pub async fn history_for_stage(
        &self,
        project_id: &str,
        stage: Stage,
        limit: usize,
    ) -> SyncResult<Vec<VersionRecord>> {
        Ok(self
            .store
            .list_for_project(project_id, Some(stage), Some(limit))
            .await?)
    }

    pub async fn get_version(&self, version_id: &str) -> SyncResult<VersionRecord> {
        Ok(self.store.get_version(version_id).await?)
    }

    pub async fn statistics(&self, project_id: &str) -> SyncResult<VersionStatistics> {
        let records = self.store.list_for_project(project_id, None, None).await?;

        let mut versions_by_stage: BTreeMap<Stage, usize> =
            Stage::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut change_types = ChangeTypeCounts::default();
        for record in &records {
            *versions_by_stage.entry(record.stage).or_default() += 1;
            for change in &record.changes {
                change_types.add(change.change_type());
            }
        }

        Ok(VersionStatistics {
            total_versions: records.len(),
            versions_by_stage,
            change_types,
            recent_activity: records.into_iter().take(RECENT_ACTIVITY_LIMIT).collect(),
        })
    }

    /// Entity state right after `version_number`; `None` if it was deleted then
    pub async fn state_at(
        &self,
        entity_id: &str,
        version_number: u32,
    ) -> SyncResult<Option<FieldSet>> {
        let records = self.store.list_for_entity(entity_id).await?;
        if !records.iter().any(|r| r.version_number == version_number) {
            return Err(SyncError::NotFound {
                kind: "version",
                id: format!("{entity_id}@{version_number}"),
            });
        }
        Ok(fold_forward(&records, version_number))
    }
}
