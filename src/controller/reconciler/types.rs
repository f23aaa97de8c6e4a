//! # Reconciliation Types
//!
//! Inputs and outputs of the three-way reconciliation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Which side a change is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local → remote
    Push,
    /// Remote → local
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// A key whose new value is written to one side; `value: None` deletes it there
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub key: String,
    pub value: Option<String>,
    pub direction: Direction,
}

/// A key changed on both sides since the last sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub key: String,
    pub base: Option<String>,
    pub local: Option<String>,
    pub remote: Option<String>,
    /// Side whose value was kept
    pub winner: Direction,
}

impl Conflict {
    /// Value both sides end up with
    #[must_use]
    pub fn resolved_value(&self) -> Option<&str> {
        match self.winner {
            Direction::Pull => self.remote.as_deref(),
            Direction::Push => self.local.as_deref(),
        }
    }

    /// Value that was overwritten by the resolution
    #[must_use]
    pub fn discarded_value(&self) -> Option<&str> {
        match self.winner {
            Direction::Pull => self.local.as_deref(),
            Direction::Push => self.remote.as_deref(),
        }
    }
}

/// A key whose write failed; it is retried on the next sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedKey {
    pub key: String,
    pub direction: Direction,
    pub reason: String,
}

/// Outcome of a reconciliation
///
/// All lists are sorted by key. Conflict resolutions also appear in `applied`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub applied: Vec<AppliedChange>,
    pub conflicts: Vec<Conflict>,
    pub unchanged: usize,
    pub failed: Vec<FailedKey>,
    /// Actions skipped because the sync mode excludes their direction
    pub deferred: Vec<AppliedChange>,
}

impl MergeResult {
    /// Nothing to write on either side
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.applied.is_empty() && self.conflicts.is_empty() && self.failed.is_empty()
    }

    pub fn pushes(&self) -> impl Iterator<Item = &AppliedChange> {
        self.applied
            .iter()
            .filter(|c| c.direction == Direction::Push)
    }

    pub fn pulls(&self) -> impl Iterator<Item = &AppliedChange> {
        self.applied
            .iter()
            .filter(|c| c.direction == Direction::Pull)
    }

    /// Move actions the mode does not allow from `applied` to `deferred`
    pub fn restrict_to(&mut self, mode: SyncMode) {
        let (kept, deferred): (Vec<_>, Vec<_>) = std::mem::take(&mut self.applied)
            .into_iter()
            .partition(|c| mode.allows(c.direction));
        self.applied = kept;
        self.deferred.extend(deferred);
        self.deferred.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Move a key from `applied` to `failed`
    pub fn mark_failed(&mut self, key: &str, reason: impl Into<String>) {
        if let Some(pos) = self.applied.iter().position(|c| c.key == key) {
            let change = self.applied.remove(pos);
            let failed = FailedKey {
                key: change.key,
                direction: change.direction,
                reason: reason.into(),
            };
            let at = self
                .failed
                .binary_search_by(|f| f.key.as_str().cmp(key))
                .unwrap_or_else(|i| i);
            self.failed.insert(at, failed);
        }
    }

    /// True when `key` was not written this pass
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.failed.iter().any(|f| f.key == key) || self.deferred.iter().any(|d| d.key == key)
    }
}

/// Which directions a sync pass may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Remote → local only
    Pull,
    /// Local → remote only
    Push,
    #[default]
    Both,
}

impl SyncMode {
    #[must_use]
    pub fn allows(&self, direction: Direction) -> bool {
        match self {
            SyncMode::Both => true,
            SyncMode::Pull => direction == Direction::Pull,
            SyncMode::Push => direction == Direction::Push,
        }
    }
}

/// How conflicting edits are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// The remote value is kept and the local one reported
    #[default]
    RemoteWins,
    /// The side modified last is kept; ties go to the remote
    MostRecent,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-wins" | "remote_wins" | "remote" => Ok(ConflictPolicy::RemoteWins),
            "most-recent" | "most_recent" | "latest" => Ok(ConflictPolicy::MostRecent),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

/// Tuning for [`reconcile_with`](super::reconcile_with)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub policy: ConflictPolicy,
    /// Modification time of the local file, for [`ConflictPolicy::MostRecent`]
    pub local_modified_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(key: &str, direction: Direction) -> AppliedChange {
        AppliedChange {
            key: key.into(),
            value: Some("v".into()),
            direction,
        }
    }

    #[test]
    fn test_restrict_to_pull_defers_pushes() {
        let mut result = MergeResult {
            applied: vec![change("A", Direction::Push), change("B", Direction::Pull)],
            ..MergeResult::default()
        };
        result.restrict_to(SyncMode::Pull);
        assert_eq!(result.applied, vec![change("B", Direction::Pull)]);
        assert_eq!(result.deferred, vec![change("A", Direction::Push)]);
        assert!(result.is_pending("A"));
        assert!(!result.is_pending("B"));
    }

    #[test]
    fn test_mark_failed_keeps_order() {
        let mut result = MergeResult {
            applied: vec![
                change("A", Direction::Push),
                change("B", Direction::Push),
                change("C", Direction::Push),
            ],
            ..MergeResult::default()
        };
        result.mark_failed("C", "boom");
        result.mark_failed("A", "boom");
        let failed: Vec<&str> = result.failed.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["A", "C"]);
        assert_eq!(result.applied.len(), 1);
    }

    #[test]
    fn test_conflict_policy_parse() {
        assert_eq!(
            "most-recent".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::MostRecent
        );
        assert!("coin-flip".parse::<ConflictPolicy>().is_err());
    }
}
