//! # Rollback
//!
//! Restores earlier entry state as a new forward change. History is never
//! rewritten: every rollback goes through [`EntryService`] and therefore
//! appends its own version record.
//!
//! - [`RollbackEngine::rollback_field`] restores one field to the `oldValue`
//!   of a recorded `modified` change.
//! - [`RollbackEngine::rollback_entity`] restores the whole state that
//!   resulted from a version, replaying the stream rather than treating any
//!   record as a snapshot. Rolling back a `deleted` record recreates the entry
//!   from its final state under a new id.

use tracing::info;

use super::entries::{EntryService, Mutation, Session};
use super::ledger::{fold_forward, rewind};
use crate::error::{SyncError, SyncResult};
use crate::model::{
    Entry, EntryPatch, FieldChange, FieldSet, NewEntry, TrackedField, VersionRecord,
};

#[derive(Debug, Clone)]
pub struct RollbackEngine {
    entries: EntryService,
}

impl RollbackEngine {
    pub fn new(entries: EntryService) -> Self {
        Self { entries }
    }

    /// Set one field back to the value it had before `version_id`
    pub async fn rollback_field(
        &self,
        session: &Session,
        version_id: &str,
        field_name: &str,
    ) -> SyncResult<Mutation<Entry>> {
        let record = self.entries.ledger().get_version(version_id).await?;
        let missing = || SyncError::NotFound {
            kind: "field change",
            id: format!("{version_id}/{field_name}"),
        };

        let field: TrackedField = field_name.parse().map_err(|_| missing())?;
        let old_value = match record.change_for(field) {
            Some(FieldChange::Modified { old_value, .. }) => old_value.clone(),
            _ => return Err(missing()),
        };

        let patch = field_patch(field, old_value)?;
        info!(
            "Rolling back {} of entry {} to version {}",
            field, record.entity_id, record.version_number
        );
        self.entries
            .update(session, &record.entity_id, patch)
            .await
    }

    /// Restore the entry state that resulted from `version_id`
    pub async fn rollback_entity(
        &self,
        session: &Session,
        version_id: &str,
    ) -> SyncResult<Mutation<Entry>> {
        let record = self.entries.ledger().get_version(version_id).await?;
        let history = self.entries.ledger().history(&record.entity_id).await?;

        if record.is_deletion() {
            let fields = deleted_fields(&record).ok_or_else(|| SyncError::NotFound {
                kind: "entry state",
                id: version_id.to_string(),
            })?;
            info!("Restoring deleted entry {} from version {}", fields.key, version_id);
            return self.recreate(session, &record, fields).await;
        }

        match self.entries.remote().get(&record.entity_id).await {
            Ok(current) => {
                let target = fold_forward(&history, record.version_number).unwrap_or_else(|| {
                    rewind(&current.tracked_fields(), &history, record.version_number)
                });
                info!(
                    "Rolling back entry {} to version {}",
                    current.key, record.version_number
                );
                self.entries
                    .update_from(session, &current, target.to_patch())
                    .await
            }
            Err(crate::error::StoreError::NotFound { .. }) => {
                // Deleted since; bring it back in the state of that version
                let target = fold_forward(&history, record.version_number).ok_or_else(|| {
                    SyncError::NotFound {
                        kind: "entry state",
                        id: version_id.to_string(),
                    }
                })?;
                self.recreate(session, &record, target).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Entry state right after `version_id`, without changing anything
    pub async fn preview(&self, version_id: &str) -> SyncResult<Option<FieldSet>> {
        let record = self.entries.ledger().get_version(version_id).await?;
        self.entries
            .ledger()
            .state_at(&record.entity_id, record.version_number)
            .await
    }

    async fn recreate(
        &self,
        session: &Session,
        record: &VersionRecord,
        fields: FieldSet,
    ) -> SyncResult<Mutation<Entry>> {
        let new = NewEntry {
            project_id: record.project_id.clone(),
            stage: fields.stage,
            key: fields.key,
            value: fields.value,
            kind: fields.kind,
            description: fields.description,
            created_by: session.author.clone(),
        };
        self.entries.create(session, new).await
    }
}

fn deleted_fields(record: &VersionRecord) -> Option<FieldSet> {
    record.changes.iter().find_map(|change| match change {
        FieldChange::Deleted { fields } => Some(fields.clone()),
        _ => None,
    })
}

/// Patch restoring a single field
fn field_patch(field: TrackedField, value: Option<String>) -> SyncResult<EntryPatch> {
    let mut patch = EntryPatch::default();
    match field {
        TrackedField::Value => patch.value = Some(value.unwrap_or_default()),
        TrackedField::Description => patch.description = Some(value),
        TrackedField::Kind => {
            let kind = value
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(SyncError::Rejected)?;
            patch.kind = Some(kind);
        }
        TrackedField::Key | TrackedField::Stage => {
            return Err(SyncError::Rejected(format!(
                "{field} cannot be changed in place; delete and recreate the entry instead"
            )));
        }
    }
    Ok(patch)
}
