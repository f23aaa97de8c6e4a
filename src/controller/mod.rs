//! # Controller
//!
//! The sync and versioning engine.
//!
//! - [`reconciler`]: pure three-way reconciliation and write-set derivation
//! - [`ledger`]: append-only version history with field diffs
//! - [`entries`]: the single remote mutation path, recording history after each change
//! - [`rollback`]: field and entity rollback as forward changes
//! - [`orchestrator`]: single-flight sync passes against one env file
//! - [`backoff`]: Fibonacci backoff for retrying the remote store

pub mod backoff;
pub mod entries;
pub mod ledger;
pub mod orchestrator;
pub mod reconciler;
pub mod rollback;

pub use entries::{EntryService, Mutation, Session};
pub use ledger::{VersionLedger, VersionStatistics};
pub use orchestrator::{
    SyncOrchestrator, SyncOutcome, SyncReport, SyncStatus, SyncTarget, TriggerSource,
};
pub use rollback::RollbackEngine;
