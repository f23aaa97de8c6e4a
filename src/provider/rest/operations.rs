//! # REST Operations
//!
//! [`RemoteStore`] and [`VersionStore`] implementations for [`RestRemoteStore`].

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info, info_span, Instrument};

use super::documents::{
    CreateEntryRequest, DocumentList, EntryDocument, UpdateEntryRequest, VersionDocument,
};
use super::polling;
use super::RestRemoteStore;
use crate::error::StoreResult;
use crate::model::{Entry, EntryPatch, NewEntry, Stage, VersionRecord};
use crate::provider::{RemoteStore, Subscription, VersionStore};

impl RestRemoteStore {
    /// All entries of a project across stages, used by the polling subscription
    pub(crate) async fn list_project(&self, project_id: &str) -> StoreResult<Vec<Entry>> {
        let url = self.url(&["projects", project_id, "entries"]);
        let list: DocumentList<EntryDocument> = self
            .execute("list_project", self.make_request(Method::GET, url), None)
            .await?;
        list.documents.into_iter().map(Entry::try_from).collect()
    }

    async fn list_versions(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> StoreResult<Vec<VersionRecord>> {
        let list: DocumentList<VersionDocument> = self.execute(operation, request, None).await?;
        list.documents
            .into_iter()
            .map(VersionRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn list(&self, project_id: &str, stage: Stage) -> StoreResult<Vec<Entry>> {
        let span = info_span!("remote.entries.list", project.id = project_id, stage = %stage);
        async move {
            let url = self.url(&["projects", project_id, "stages", stage.as_str(), "entries"]);
            let list: DocumentList<EntryDocument> = self
                .execute("list", self.make_request(Method::GET, url), None)
                .await?;
            let entries: Vec<Entry> = list
                .documents
                .into_iter()
                .map(Entry::try_from)
                .collect::<StoreResult<_>>()?;
            debug!("Listed {} remote entries", entries.len());
            Ok(entries)
        }
        .instrument(span)
        .await
    }

    async fn get(&self, entity_id: &str) -> StoreResult<Entry> {
        let url = self.url(&["entries", entity_id]);
        let doc: EntryDocument = self
            .execute(
                "get",
                self.make_request(Method::GET, url),
                Some(("entry", entity_id)),
            )
            .await?;
        Entry::try_from(doc)
    }

    async fn create(&self, entry: NewEntry) -> StoreResult<Entry> {
        let span = info_span!("remote.entry.create", entry.key = %entry.key, stage = %entry.stage);
        async move {
            let url = self.url(&["entries"]);
            let body = CreateEntryRequest::from(entry);
            let doc: EntryDocument = self
                .execute(
                    "create",
                    self.make_request(Method::POST, url).json(&body),
                    None,
                )
                .await?;
            let created = Entry::try_from(doc)?;
            info!("Created remote entry {} ({})", created.key, created.id);
            Ok(created)
        }
        .instrument(span)
        .await
    }

    async fn update(&self, entity_id: &str, patch: EntryPatch) -> StoreResult<Entry> {
        let span = info_span!("remote.entry.update", entry.id = entity_id);
        async move {
            let url = self.url(&["entries", entity_id]);
            let body = UpdateEntryRequest::from(patch);
            let doc: EntryDocument = self
                .execute(
                    "update",
                    self.make_request(Method::PATCH, url).json(&body),
                    Some(("entry", entity_id)),
                )
                .await?;
            Entry::try_from(doc)
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, entity_id: &str) -> StoreResult<()> {
        let span = info_span!("remote.entry.delete", entry.id = entity_id);
        async move {
            let url = self.url(&["entries", entity_id]);
            self.execute_empty(
                "delete",
                self.make_request(Method::DELETE, url),
                Some(("entry", entity_id)),
            )
            .await?;
            info!("Deleted remote entry {}", entity_id);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn subscribe(&self, project_id: &str) -> StoreResult<Subscription> {
        Ok(polling::subscribe(self.clone(), project_id.to_string()))
    }
}

#[async_trait]
impl VersionStore for RestRemoteStore {
    async fn append(&self, record: VersionRecord) -> StoreResult<VersionRecord> {
        let url = self.url(&["versions"]);
        let body = VersionDocument::try_from(&record)?;
        let doc: VersionDocument = self
            .execute(
                "append_version",
                self.make_request(Method::POST, url).json(&body),
                None,
            )
            .await?;
        VersionRecord::try_from(doc)
    }

    async fn latest_version_number(&self, entity_id: &str) -> StoreResult<Option<u32>> {
        Ok(self
            .list_for_entity(entity_id)
            .await?
            .iter()
            .map(|v| v.version_number)
            .max())
    }

    async fn get_version(&self, version_id: &str) -> StoreResult<VersionRecord> {
        let url = self.url(&["versions", version_id]);
        let doc: VersionDocument = self
            .execute(
                "get_version",
                self.make_request(Method::GET, url),
                Some(("version", version_id)),
            )
            .await?;
        VersionRecord::try_from(doc)
    }

    async fn list_for_entity(&self, entity_id: &str) -> StoreResult<Vec<VersionRecord>> {
        let url = self.url(&["entries", entity_id, "versions"]);
        self.list_versions("list_entity_versions", self.make_request(Method::GET, url))
            .await
    }

    async fn list_for_project(
        &self,
        project_id: &str,
        stage: Option<Stage>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<VersionRecord>> {
        let mut url = self.url(&["projects", project_id, "versions"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(stage) = stage {
                query.append_pair("stage", stage.as_str());
            }
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        let mut records = self
            .list_versions("list_project_versions", self.make_request(Method::GET, url))
            .await?;
        // Server order is not part of the contract
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
