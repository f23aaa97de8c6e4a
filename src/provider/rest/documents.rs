//! # Wire Documents
//!
//! JSON payloads exchanged with the remote store's REST API.
//!
//! The remote document database stores flat documents: enum fields travel as
//! strings, timestamps as RFC 3339 strings, and a version record's `changes`
//! list as a JSON-encoded string. Conversion to and from the typed model
//! happens only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Entry, EntryPatch, FieldChange, NewEntry, Stage, ValueKind, VersionRecord};

/// Paged list response
#[derive(Debug, Deserialize)]
pub struct DocumentList<T> {
    #[serde(default = "Vec::new")]
    pub documents: Vec<T>,
    #[serde(default)]
    #[allow(dead_code, reason = "Returned by the API, not needed for sync")]
    pub total: Option<usize>,
}

/// Stored entry document
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocument {
    pub id: String,
    pub project_id: String,
    pub stage: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub last_modified_at: String,
    #[serde(default)]
    pub last_modified_by: String,
}

impl TryFrom<EntryDocument> for Entry {
    type Error = StoreError;

    fn try_from(doc: EntryDocument) -> Result<Self, Self::Error> {
        let kind = match doc.kind.as_deref() {
            None | Some("") => ValueKind::default(),
            Some(kind) => kind.parse().map_err(StoreError::Encoding)?,
        };
        Ok(Entry {
            stage: parse_stage(&doc.stage)?,
            created_at: parse_timestamp(&doc.created_at)?,
            last_modified_at: parse_timestamp(&doc.last_modified_at)?,
            id: doc.id,
            project_id: doc.project_id,
            key: doc.key,
            value: doc.value,
            kind,
            description: doc.description,
            last_modified_by: doc.last_modified_by,
        })
    }
}

/// Body of `POST /entries`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub project_id: String,
    pub stage: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_modified_by: String,
}

impl From<NewEntry> for CreateEntryRequest {
    fn from(entry: NewEntry) -> Self {
        Self {
            project_id: entry.project_id,
            stage: entry.stage.to_string(),
            key: entry.key,
            value: entry.value,
            kind: entry.kind.to_string(),
            description: entry.description,
            last_modified_by: entry.created_by,
        }
    }
}

/// Body of `PATCH /entries/{id}`; absent fields are left unchanged
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// `Some(None)` serializes as `null` and clears the description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_modified_by: String,
}

impl From<EntryPatch> for UpdateEntryRequest {
    fn from(patch: EntryPatch) -> Self {
        Self {
            value: patch.value,
            kind: patch.kind.map(|k| k.to_string()),
            description: patch.description,
            last_modified_by: patch.modified_by,
        }
    }
}

/// Stored version record document
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    pub id: String,
    pub entity_id: String,
    pub project_id: String,
    pub stage: String,
    pub version_number: u32,
    /// JSON-encoded list of field changes
    pub changes: String,
    pub author: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TryFrom<&VersionRecord> for VersionDocument {
    type Error = StoreError;

    fn try_from(record: &VersionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.clone(),
            entity_id: record.entity_id.clone(),
            project_id: record.project_id.clone(),
            stage: record.stage.to_string(),
            version_number: record.version_number,
            changes: serde_json::to_string(&record.changes)?,
            author: record.author.clone(),
            created_at: record.created_at.to_rfc3339(),
            message: record.message.clone(),
        })
    }
}

impl TryFrom<VersionDocument> for VersionRecord {
    type Error = StoreError;

    fn try_from(doc: VersionDocument) -> Result<Self, Self::Error> {
        let changes: Vec<FieldChange> = serde_json::from_str(&doc.changes)?;
        Ok(VersionRecord {
            stage: parse_stage(&doc.stage)?,
            created_at: parse_timestamp(&doc.created_at)?,
            id: doc.id,
            entity_id: doc.entity_id,
            project_id: doc.project_id,
            version_number: doc.version_number,
            changes,
            author: doc.author,
            message: doc.message,
        })
    }
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

fn parse_stage(stage: &str) -> Result<Stage, StoreError> {
    stage
        .parse()
        .map_err(|e: crate::error::ConfigError| StoreError::Encoding(e.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Encoding(format!("invalid timestamp '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedField;

    fn entry_json() -> serde_json::Value {
        serde_json::json!({
            "id": "e1",
            "projectId": "p",
            "stage": "production",
            "key": "API_URL",
            "value": "https://example.com",
            "type": "string",
            "createdAt": "2024-05-01T10:00:00Z",
            "lastModifiedAt": "2024-05-02T10:00:00+02:00",
            "lastModifiedBy": "alice"
        })
    }

    #[test]
    fn test_entry_document_to_entry() {
        let doc: EntryDocument = serde_json::from_value(entry_json()).unwrap();
        let entry = Entry::try_from(doc).unwrap();
        assert_eq!(entry.stage, Stage::Production);
        assert_eq!(entry.kind, ValueKind::String);
        assert_eq!(entry.description, None);
        assert_eq!(entry.last_modified_at.to_rfc3339(), "2024-05-02T08:00:00+00:00");
    }

    #[test]
    fn test_entry_document_bad_stage() {
        let mut json = entry_json();
        json["stage"] = "qa".into();
        let doc: EntryDocument = serde_json::from_value(json).unwrap();
        assert!(matches!(Entry::try_from(doc), Err(StoreError::Encoding(_))));
    }

    #[test]
    fn test_update_request_clears_description() {
        let patch = EntryPatch {
            description: Some(None),
            ..EntryPatch::default()
        };
        let json = serde_json::to_value(UpdateEntryRequest::from(patch)).unwrap();
        assert_eq!(json, serde_json::json!({ "description": null }));
    }

    #[test]
    fn test_version_document_changes_are_a_json_string() {
        let record = VersionRecord {
            id: "v1".into(),
            entity_id: "e1".into(),
            project_id: "p".into(),
            stage: Stage::Staging,
            version_number: 2,
            changes: vec![FieldChange::Modified {
                field: TrackedField::Value,
                old_value: Some("1".into()),
                new_value: Some("2".into()),
            }],
            author: "alice".into(),
            created_at: Utc::now(),
            message: None,
        };
        let doc = VersionDocument::try_from(&record).unwrap();
        assert!(doc.changes.contains("\"changeType\":\"modified\""));

        let decoded = VersionRecord::try_from(doc).unwrap();
        assert_eq!(decoded.changes, record.changes);
        assert_eq!(decoded.version_number, 2);
    }
}
