//! # Model
//!
//! Core data types shared by the sync engine, the version ledger and the
//! remote store adapters.

mod entry;
mod version;

pub use entry::{Entry, EntryPatch, FieldSet, NewEntry, Stage, ValueKind};
pub use version::{ChangeType, FieldChange, TrackedField, VersionRecord};

use std::collections::BTreeMap;

/// Point-in-time key → value mapping (local file contents or the sync baseline)
///
/// A `BTreeMap` so iteration is always in ascending key order.
pub type Snapshot = BTreeMap<String, String>;

/// Remote entries for one project/stage, keyed by entry key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    entries: BTreeMap<String, Entry>,
}

impl RemoteSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Entry> for RemoteSnapshot {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}
