//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use envzip::prelude::*;
//! ```

// Model types
pub use crate::model::{
    Entry, EntryPatch, FieldChange, FieldSet, NewEntry, RemoteSnapshot, Snapshot, Stage,
    TrackedField, ValueKind, VersionRecord,
};

// Provider traits and adapters
pub use crate::provider::memory::MemoryStore;
pub use crate::provider::rest::RestRemoteStore;
pub use crate::provider::{RemoteEvent, RemoteEventKind, RemoteStore, Subscription, VersionStore};

// Engine
pub use crate::controller::reconciler::{
    reconcile, reconcile_with, ConflictPolicy, Direction, MergeResult, ReconcileOptions, SyncMode,
};
pub use crate::controller::{
    EntryService, Mutation, RollbackEngine, Session, SyncOrchestrator, SyncOutcome, SyncReport,
    SyncStatus, SyncTarget, TriggerSource, VersionLedger,
};

// Config types
pub use crate::config::{RuntimeConfig, SyncConfig};

// Common error types
pub use crate::error::{ConfigError, StoreError, SyncError, SyncResult};
