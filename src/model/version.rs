//! # Version Records
//!
//! Immutable audit-log entries describing one change set of an [`Entry`](super::Entry).
//!
//! A record never changes after it is written. Rolling back produces a new
//! record; history is only ever appended to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entry::{Entry, FieldSet, Stage, ValueKind};

/// Entry fields tracked by the version ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedField {
    Key,
    Value,
    Description,
    Kind,
    Stage,
}

impl TrackedField {
    pub const ALL: [TrackedField; 5] = [
        TrackedField::Key,
        TrackedField::Value,
        TrackedField::Description,
        TrackedField::Kind,
        TrackedField::Stage,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Key => "key",
            TrackedField::Value => "value",
            TrackedField::Description => "description",
            TrackedField::Kind => "kind",
            TrackedField::Stage => "stage",
        }
    }

    /// Rendered value of this field in a field set
    #[must_use]
    pub fn read(&self, fields: &FieldSet) -> Option<String> {
        match self {
            TrackedField::Key => Some(fields.key.clone()),
            TrackedField::Value => Some(fields.value.clone()),
            TrackedField::Description => fields.description.clone(),
            TrackedField::Kind => Some(fields.kind.as_str().to_string()),
            TrackedField::Stage => Some(fields.stage.as_str().to_string()),
        }
    }

    /// Write a rendered value back into a field set
    ///
    /// Returns false when the value cannot be represented (e.g. an unknown kind).
    pub fn write(&self, fields: &mut FieldSet, value: Option<&str>) -> bool {
        match self {
            TrackedField::Key => match value {
                Some(v) => {
                    fields.key = v.to_string();
                    true
                }
                None => false,
            },
            TrackedField::Value => {
                fields.value = value.unwrap_or_default().to_string();
                true
            }
            TrackedField::Description => {
                fields.description = value.map(str::to_string);
                true
            }
            TrackedField::Kind => match value.map(str::parse::<ValueKind>) {
                Some(Ok(kind)) => {
                    fields.kind = kind;
                    true
                }
                _ => false,
            },
            TrackedField::Stage => match value.map(str::parse::<Stage>) {
                Some(Ok(stage)) => {
                    fields.stage = stage;
                    true
                }
                _ => false,
            },
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackedField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// Kind of change captured in a [`FieldChange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        }
    }
}

/// One entry in a version record's change list
///
/// `Created` and `Deleted` carry the whole tracked field set; `Modified` carries
/// a single field's before and after values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "changeType", rename_all = "lowercase")]
pub enum FieldChange {
    Created {
        #[serde(rename = "newValue")]
        fields: FieldSet,
    },
    #[serde(rename_all = "camelCase")]
    Modified {
        field: TrackedField,
        old_value: Option<String>,
        new_value: Option<String>,
    },
    Deleted {
        #[serde(rename = "oldValue")]
        fields: FieldSet,
    },
}

impl FieldChange {
    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        match self {
            FieldChange::Created { .. } => ChangeType::Created,
            FieldChange::Modified { .. } => ChangeType::Modified,
            FieldChange::Deleted { .. } => ChangeType::Deleted,
        }
    }

    /// Field name as shown in history listings
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldChange::Created { .. } => "created",
            FieldChange::Modified { field, .. } => field.as_str(),
            FieldChange::Deleted { .. } => "deleted",
        }
    }
}

/// Immutable record of one change to an entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: String,
    /// Weak back-reference; the entry may since have been deleted
    pub entity_id: String,
    pub project_id: String,
    pub stage: Stage,
    pub version_number: u32,
    pub changes: Vec<FieldChange>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

impl VersionRecord {
    pub(crate) fn new(
        entry: &Entry,
        version_number: u32,
        changes: Vec<FieldChange>,
        author: &str,
        message: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_id: entry.id.clone(),
            project_id: entry.project_id.clone(),
            stage: entry.stage,
            version_number,
            changes,
            author: author.to_string(),
            created_at: Utc::now(),
            message,
        }
    }

    /// The `Modified` change for a field, if this record touched it
    #[must_use]
    pub fn change_for(&self, field: TrackedField) -> Option<&FieldChange> {
        self.changes.iter().find(
            |change| matches!(change, FieldChange::Modified { field: f, .. } if *f == field),
        )
    }

    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.change_type() == ChangeType::Deleted)
    }
}
