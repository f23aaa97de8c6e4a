//! # Entry
//!
//! An environment variable scoped to a project and stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Environment stage an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Development,
    Staging,
    Production,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Development, Stage::Staging, Stage::Production];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Development => "development",
            Stage::Staging => "staging",
            Stage::Production => "production",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Stage::Development),
            "staging" | "stage" => Ok(Stage::Staging),
            "production" | "prod" => Ok(Stage::Production),
            other => Err(ConfigError::InvalidStage(other.to_string())),
        }
    }
}

/// Presentation and validation hint for an entry's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Number,
    Boolean,
    Secret,
}

impl ValueKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ValueKind::String),
            "number" => Ok(ValueKind::Number),
            "boolean" => Ok(ValueKind::Boolean),
            "secret" => Ok(ValueKind::Secret),
            other => Err(format!("unknown value kind '{other}'")),
        }
    }
}

/// A stored environment variable
///
/// `key` never changes after creation; a rename is a delete followed by a create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub project_id: String,
    pub stage: Stage,
    pub key: String,
    pub value: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub last_modified_by: String,
}

impl Entry {
    /// Snapshot of the fields tracked by the version ledger
    #[must_use]
    pub fn tracked_fields(&self) -> FieldSet {
        FieldSet {
            key: self.key.clone(),
            value: self.value.clone(),
            description: self.description.clone(),
            kind: self.kind,
            stage: self.stage,
        }
    }
}

/// Fields for a new entry; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub project_id: String,
    pub stage: Stage,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
}

impl NewEntry {
    pub fn new(
        project_id: impl Into<String>,
        stage: Stage,
        key: impl Into<String>,
        value: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            stage,
            key: key.into(),
            value: value.into(),
            kind: ValueKind::default(),
            description: None,
            created_by: created_by.into(),
        }
    }
}

/// Partial update of an entry's mutable fields
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub modified_by: String,
}

impl EntryPatch {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.kind.is_none() && self.description.is_none()
    }

    /// Apply the patch to an entry in place
    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(value) = &self.value {
            entry.value.clone_from(value);
        }
        if let Some(kind) = self.kind {
            entry.kind = kind;
        }
        if let Some(description) = &self.description {
            entry.description.clone_from(description);
        }
    }
}

/// The set of entry fields whose changes are recorded in version history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSet {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: ValueKind,
    pub stage: Stage,
}

impl FieldSet {
    /// Patch that moves an entry's mutable fields to this state
    #[must_use]
    pub fn to_patch(&self) -> EntryPatch {
        EntryPatch {
            value: Some(self.value.clone()),
            kind: Some(self.kind),
            description: Some(self.description.clone()),
            modified_by: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse_aliases() {
        assert_eq!("production".parse::<Stage>().unwrap(), Stage::Production);
        assert_eq!("Dev".parse::<Stage>().unwrap(), Stage::Development);
        assert!("qa".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_serde_lowercase() {
        let json = serde_json::to_string(&Stage::Staging).unwrap();
        assert_eq!(json, "\"staging\"");
    }

    #[test]
    fn test_patch_clears_description() {
        let now = Utc::now();
        let mut entry = Entry {
            id: "e1".into(),
            project_id: "p".into(),
            stage: Stage::Development,
            key: "A".into(),
            value: "1".into(),
            kind: ValueKind::String,
            description: Some("old".into()),
            created_at: now,
            last_modified_at: now,
            last_modified_by: "alice".into(),
        };
        let patch = EntryPatch {
            description: Some(None),
            ..EntryPatch::default()
        };
        patch.apply_to(&mut entry);
        assert_eq!(entry.description, None);
        assert_eq!(entry.value, "1");
    }
}
