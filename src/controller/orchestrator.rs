//! # Sync Orchestrator
//!
//! Runs sync passes for one env file against one project/stage.
//!
//! A pass reads both sides and the baseline, reconciles them, writes the
//! remote side key by key through [`EntryService`], writes the local file and
//! finally persists the new baseline. At most one pass runs at a time: a
//! trigger arriving while a pass is in flight is coalesced into a single
//! follow-up pass (see [`SyncOrchestrator::take_rerun`]).
//!
//! A remote listing failure aborts the pass before anything is written. A
//! failed remote write only fails its own key; the key keeps its previous
//! baseline value and is classified the same way on the next pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::entries::{EntryService, Session};
use super::reconciler::{
    local_updates, next_baseline, reconcile_with, remote_updates, ConflictPolicy, MergeResult,
    ReconcileOptions, RemoteWrite, SyncMode,
};
use crate::config::{is_valid_key, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::model::{EntryPatch, NewEntry, RemoteSnapshot, Stage};
use crate::observability::metrics;
use crate::parser;
use crate::store::{Baseline, BaselineStore, LocalStore};

/// What started a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    /// `envzip pull`, `push` or `sync`
    Manual,
    /// First pass when watching starts
    Startup,
    /// The env file changed on disk
    LocalFile,
    /// A remote change event for this stage
    Remote,
    /// Follow-up for triggers coalesced during the previous pass
    Rerun,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Startup => "startup",
            TriggerSource::LocalFile => "local-file",
            TriggerSource::Remote => "remote",
            TriggerSource::Rerun => "rerun",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The env file and the remote project/stage it mirrors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub project_id: String,
    pub stage: Stage,
    pub env_path: PathBuf,
}

impl SyncTarget {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            project_id: config.project_key.clone(),
            stage: config.stage,
            env_path: config.env_file_path(),
        }
    }
}

/// Result of a completed pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub trigger: TriggerSource,
    #[serde(skip)]
    pub mode: SyncMode,
    pub result: MergeResult,
    /// Mutations that succeeded without a version record
    pub history_warnings: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

impl SyncReport {
    /// True when the pass wrote nothing and nothing failed
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.result.applied.is_empty() && self.result.failed.is_empty()
    }

    /// True when every key was written on every side the mode allows
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.result.failed.is_empty()
    }
}

/// What [`SyncOrchestrator::sync`] did with a trigger
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in flight; a follow-up pass has been requested
    Coalesced,
}

/// Pending work without writing anything
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub project_id: String,
    pub stage: Stage,
    pub env_path: PathBuf,
    pub local_count: usize,
    pub remote_count: usize,
    pub pending_push: usize,
    pub pending_pull: usize,
    pub conflicts: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.pending_push == 0 && self.pending_pull == 0 && self.conflicts == 0
    }
}

/// Releases the in-flight flag when the pass ends, including on error
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight sync driver for one [`SyncTarget`]
#[derive(Debug)]
pub struct SyncOrchestrator {
    entries: EntryService,
    target: SyncTarget,
    session: Session,
    policy: ConflictPolicy,
    local: LocalStore,
    baseline: BaselineStore,
    in_flight: AtomicBool,
    rerun: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(entries: EntryService, target: SyncTarget, session: Session) -> Self {
        let local = LocalStore::new(&target.env_path);
        let baseline = BaselineStore::for_env_file(&target.env_path);
        Self {
            entries,
            target,
            session,
            policy: ConflictPolicy::default(),
            local,
            baseline,
            in_flight: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    #[must_use]
    pub fn entries(&self) -> &EntryService {
        &self.entries
    }

    #[must_use]
    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Record a trigger that arrived while a pass was running
    pub fn coalesce(&self) {
        self.rerun.store(true, Ordering::Release);
        metrics::increment_triggers_coalesced();
        debug!("Sync already in progress, trigger coalesced");
    }

    /// Clear and return the follow-up request set by coalesced triggers
    pub fn take_rerun(&self) -> bool {
        self.rerun.swap(false, Ordering::AcqRel)
    }

    /// Run one pass, or coalesce the trigger if a pass is already running
    pub async fn sync(&self, mode: SyncMode, trigger: TriggerSource) -> SyncResult<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.coalesce();
            return Ok(SyncOutcome::Coalesced);
        }
        let _guard = PassGuard(&self.in_flight);

        let span = info_span!(
            "sync.pass",
            trigger = trigger.as_str(),
            project = self.target.project_id.as_str(),
            stage = self.target.stage.as_str(),
        );

        metrics::increment_syncs();
        let started = Instant::now();
        let outcome = self.run_pass(mode, trigger).instrument(span).await;
        metrics::observe_sync_duration(started.elapsed().as_secs_f64());

        match outcome {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(e) => {
                metrics::increment_sync_errors();
                warn!("Sync pass failed: {}", e);
                Err(e)
            }
        }
    }

    /// Compare both sides against the baseline without writing
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let local = self.local.read().await?;
        let remote = self.list_remote().await?;
        let baseline = self.load_baseline().await?;
        let options = self.reconcile_options().await?;
        let result = reconcile_with(&baseline.values, &local, &remote, &options);

        Ok(SyncStatus {
            project_id: self.target.project_id.clone(),
            stage: self.target.stage,
            env_path: self.target.env_path.clone(),
            local_count: local.len(),
            remote_count: remote.len(),
            pending_push: result
                .pushes()
                .filter(|c| !result.conflicts.iter().any(|x| x.key == c.key))
                .count(),
            pending_pull: result
                .pulls()
                .filter(|c| !result.conflicts.iter().any(|x| x.key == c.key))
                .count(),
            conflicts: result.conflicts.len(),
            last_synced_at: baseline.synced_at,
        })
    }

    async fn run_pass(&self, mode: SyncMode, trigger: TriggerSource) -> SyncResult<SyncReport> {
        let local = self.local.read().await?;
        let remote = self.list_remote().await?;
        let previous = self.load_baseline().await?;
        let options = self.reconcile_options().await?;

        let mut result = reconcile_with(&previous.values, &local, &remote, &options);
        result.restrict_to(mode);
        for conflict in &result.conflicts {
            warn!(
                "Conflict on {}: keeping {} value, discarding {:?}",
                conflict.key,
                conflict.winner,
                conflict.discarded_value()
            );
        }

        let invalid: Vec<String> = result
            .pushes()
            .filter(|c| !is_valid_key(&c.key))
            .map(|c| c.key.clone())
            .collect();
        for key in invalid {
            warn!("Skipping invalid key {:?}", key);
            result.mark_failed(&key, "invalid key name");
        }

        let unrepresentable: Vec<String> = result
            .pulls()
            .filter(|c| {
                c.value
                    .as_deref()
                    .is_some_and(|v| !parser::is_representable(&c.key, v))
            })
            .map(|c| c.key.clone())
            .collect();
        for key in unrepresentable {
            warn!("Not pulling {:?}: value cannot be written to the env file", key);
            result.mark_failed(&key, "not representable in env file");
        }

        let history_warnings = self.apply_remote(&mut result, &remote).await;

        // Remote writes are done; a local write failure leaves the old baseline in place
        self.local.write(&local_updates(&result)).await?;

        let synced_at = Utc::now();
        let baseline = Baseline {
            project_id: self.target.project_id.clone(),
            stage: Some(self.target.stage),
            synced_at: Some(synced_at),
            values: next_baseline(&previous.values, &result, &local, &remote),
        };
        self.baseline.save(&baseline).await?;

        let pushed = result.pushes().count();
        let pulled = result.pulls().count();
        metrics::increment_keys_pushed(pushed);
        metrics::increment_keys_pulled(pulled);
        metrics::increment_conflicts(result.conflicts.len());
        metrics::increment_key_failures(result.failed.len());

        info!(
            "Sync complete: {} pushed, {} pulled, {} conflicts, {} failed, {} deferred, {} unchanged",
            pushed,
            pulled,
            result.conflicts.len(),
            result.failed.len(),
            result.deferred.len(),
            result.unchanged
        );

        Ok(SyncReport {
            trigger,
            mode,
            result,
            history_warnings,
            synced_at,
        })
    }

    /// Execute remote writes one key at a time; failures are recorded on the result
    async fn apply_remote(&self, result: &mut MergeResult, remote: &RemoteSnapshot) -> Vec<String> {
        let mut warnings = Vec::new();
        for write in remote_updates(result, remote) {
            let key = write.key().to_string();
            match self.execute(&write, remote).await {
                Ok(Some(warning)) => warnings.push(format!("{key}: {warning}")),
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to {} {}: {}", write.operation(), key, e);
                    result.mark_failed(&key, e.to_string());
                }
            }
        }
        warnings
    }

    async fn execute(&self, write: &RemoteWrite, remote: &RemoteSnapshot) -> SyncResult<Option<String>> {
        let missing = |key: &str| SyncError::NotFound {
            kind: "entry",
            id: key.to_string(),
        };
        let warning = match write {
            RemoteWrite::Create { key, value } => {
                let new = NewEntry::new(
                    &self.target.project_id,
                    self.target.stage,
                    key,
                    value,
                    &self.session.author,
                );
                self.entries.create(&self.session, new).await?.history_warning
            }
            RemoteWrite::Update { key, value, .. } => {
                let current = remote.get(key).ok_or_else(|| missing(key))?;
                self.entries
                    .update_from(&self.session, current, EntryPatch::value(value.as_str()))
                    .await?
                    .history_warning
            }
            RemoteWrite::Delete { key, .. } => {
                let current = remote.get(key).ok_or_else(|| missing(key))?;
                self.entries
                    .delete_entry(&self.session, current.clone())
                    .await?
                    .history_warning
            }
        };
        Ok(warning)
    }

    async fn list_remote(&self) -> SyncResult<RemoteSnapshot> {
        let entries = self
            .entries
            .remote()
            .list(&self.target.project_id, self.target.stage)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        Ok(entries.into_iter().collect())
    }

    async fn load_baseline(&self) -> SyncResult<Baseline> {
        let baseline = self.baseline.load().await?;
        if baseline.belongs_to(&self.target.project_id, self.target.stage) {
            Ok(baseline)
        } else {
            warn!(
                "Baseline {} was recorded for another project or stage, ignoring it",
                self.baseline.path().display()
            );
            Ok(Baseline::default())
        }
    }

    async fn reconcile_options(&self) -> SyncResult<ReconcileOptions> {
        let local_modified_at = match self.policy {
            ConflictPolicy::MostRecent => self.local.modified_at().await?,
            ConflictPolicy::RemoteWins => None,
        };
        Ok(ReconcileOptions {
            policy: self.policy,
            local_modified_at,
        })
    }
}
