//! # Reconciler
//!
//! Pure three-way reconciliation of the local env file against the remote
//! store, using the last-synced baseline as the merge base.
//!
//! For every key present locally or remotely, with `L`, `R` and `S` the local,
//! remote and baseline values (`None` when absent):
//!
//! 1. `L == R` → unchanged
//! 2. `L != S`, `R == S` → push `L` to the remote (a `None` deletes it)
//! 3. `R != S`, `L == S` → pull `R` into the local file (a `None` removes the line)
//! 4. otherwise both sides changed → conflict, resolved by [`ConflictPolicy`]
//!
//! A key only on one side with no baseline falls under rule 2 or 3. Nothing
//! here performs I/O; the write sets are derived from the [`MergeResult`] and
//! executed by the orchestrator.

mod types;

pub use types::*;

use std::collections::BTreeSet;

use crate::model::{RemoteSnapshot, Snapshot};
use crate::store::LocalWriteSet;

/// A single remote mutation derived from a merge result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Create {
        key: String,
        value: String,
    },
    Update {
        entity_id: String,
        key: String,
        value: String,
    },
    Delete {
        entity_id: String,
        key: String,
    },
}

impl RemoteWrite {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            RemoteWrite::Create { key, .. }
            | RemoteWrite::Update { key, .. }
            | RemoteWrite::Delete { key, .. } => key,
        }
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            RemoteWrite::Create { .. } => "create",
            RemoteWrite::Update { .. } => "update",
            RemoteWrite::Delete { .. } => "delete",
        }
    }
}

/// Reconcile with the default remote-wins policy
#[must_use]
pub fn reconcile(base: &Snapshot, local: &Snapshot, remote: &RemoteSnapshot) -> MergeResult {
    reconcile_with(base, local, remote, &ReconcileOptions::default())
}

/// Reconcile with an explicit conflict policy
#[must_use]
pub fn reconcile_with(
    base: &Snapshot,
    local: &Snapshot,
    remote: &RemoteSnapshot,
    options: &ReconcileOptions,
) -> MergeResult {
    let keys: BTreeSet<&str> = local
        .keys()
        .chain(remote.keys())
        .map(String::as_str)
        .collect();

    let mut result = MergeResult::default();

    for key in keys {
        let l = local.get(key).map(String::as_str);
        let r = remote.value(key);
        let s = base.get(key).map(String::as_str);

        if l == r {
            result.unchanged += 1;
        } else if r == s {
            result.applied.push(AppliedChange {
                key: key.to_string(),
                value: l.map(str::to_string),
                direction: Direction::Push,
            });
        } else if l == s {
            result.applied.push(AppliedChange {
                key: key.to_string(),
                value: r.map(str::to_string),
                direction: Direction::Pull,
            });
        } else {
            let winner = conflict_winner(key, remote, options);
            let conflict = Conflict {
                key: key.to_string(),
                base: s.map(str::to_string),
                local: l.map(str::to_string),
                remote: r.map(str::to_string),
                winner,
            };
            result.applied.push(AppliedChange {
                key: key.to_string(),
                value: conflict.resolved_value().map(str::to_string),
                direction: winner,
            });
            result.conflicts.push(conflict);
        }
    }

    result
}

fn conflict_winner(key: &str, remote: &RemoteSnapshot, options: &ReconcileOptions) -> Direction {
    match options.policy {
        ConflictPolicy::RemoteWins => Direction::Pull,
        ConflictPolicy::MostRecent => {
            let remote_at = remote.get(key).map(|e| e.last_modified_at);
            match (options.local_modified_at, remote_at) {
                (Some(local_at), Some(remote_at)) if local_at > remote_at => Direction::Push,
                _ => Direction::Pull,
            }
        }
    }
}

/// Writes for the local file: pulled values and removals
#[must_use]
pub fn local_updates(result: &MergeResult) -> LocalWriteSet {
    let mut writes = LocalWriteSet::default();
    for change in result.pulls() {
        match &change.value {
            Some(value) => {
                writes.upserts.insert(change.key.clone(), value.clone());
            }
            None => {
                writes.removals.insert(change.key.clone());
            }
        }
    }
    writes
}

/// Writes for the remote store, in key order
#[must_use]
pub fn remote_updates(result: &MergeResult, remote: &RemoteSnapshot) -> Vec<RemoteWrite> {
    result
        .pushes()
        .filter_map(|change| {
            let existing = remote.get(&change.key);
            match (&change.value, existing) {
                (Some(value), Some(entry)) => Some(RemoteWrite::Update {
                    entity_id: entry.id.clone(),
                    key: change.key.clone(),
                    value: value.clone(),
                }),
                (Some(value), None) => Some(RemoteWrite::Create {
                    key: change.key.clone(),
                    value: value.clone(),
                }),
                (None, Some(entry)) => Some(RemoteWrite::Delete {
                    entity_id: entry.id.clone(),
                    key: change.key.clone(),
                }),
                (None, None) => None,
            }
        })
        .collect()
}

/// Baseline to persist after the writes of `result` were executed
///
/// Applied keys take their new value and agreed keys their common value.
/// Failed and deferred keys keep the previous baseline value so the next
/// pass classifies them the same way again.
#[must_use]
pub fn next_baseline(
    previous: &Snapshot,
    result: &MergeResult,
    local: &Snapshot,
    remote: &RemoteSnapshot,
) -> Snapshot {
    let keys: BTreeSet<&str> = previous
        .keys()
        .chain(local.keys())
        .chain(remote.keys())
        .map(String::as_str)
        .collect();

    let mut next = Snapshot::new();
    for key in keys {
        let value = if result.is_pending(key) {
            previous.get(key).cloned()
        } else if let Some(change) = result.applied.iter().find(|c| c.key == key) {
            change.value.clone()
        } else {
            match (local.get(key), remote.value(key)) {
                (Some(l), Some(r)) if l == r => Some(l.clone()),
                (None, None) => None,
                // Unresolved disagreement: leave the merge base where it was
                _ => previous.get(key).cloned(),
            }
        };
        if let Some(value) = value {
            next.insert(key.to_string(), value);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Stage, ValueKind};
    use chrono::{Duration, Utc};

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn remote(pairs: &[(&str, &str)]) -> RemoteSnapshot {
        pairs
            .iter()
            .map(|(k, v)| {
                let now = Utc::now();
                Entry {
                    id: format!("id-{k}"),
                    project_id: "p".into(),
                    stage: Stage::Development,
                    key: k.to_string(),
                    value: v.to_string(),
                    kind: ValueKind::String,
                    description: None,
                    created_at: now,
                    last_modified_at: now,
                    last_modified_by: "alice".into(),
                }
            })
            .collect()
    }

    #[test]
    fn test_identical_sides_are_unchanged() {
        let base = snapshot(&[("A", "1")]);
        let result = reconcile(&base, &snapshot(&[("A", "1")]), &remote(&[("A", "1")]));
        assert!(result.is_clean());
        assert_eq!(result.unchanged, 1);
    }

    #[test]
    fn test_local_edit_is_pushed() {
        let base = snapshot(&[("A", "1")]);
        let result = reconcile(&base, &snapshot(&[("A", "2")]), &remote(&[("A", "1")]));
        assert_eq!(
            result.applied,
            vec![AppliedChange {
                key: "A".into(),
                value: Some("2".into()),
                direction: Direction::Push,
            }]
        );
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_remote_edit_is_pulled() {
        let base = snapshot(&[("A", "1")]);
        let result = reconcile(&base, &snapshot(&[("A", "1")]), &remote(&[("A", "3")]));
        let writes = local_updates(&result);
        assert_eq!(writes.upserts.get("A").map(String::as_str), Some("3"));
        assert!(remote_updates(&result, &remote(&[("A", "3")])).is_empty());
    }

    #[test]
    fn test_both_changed_is_conflict_remote_wins() {
        let base = snapshot(&[("A", "1")]);
        let result = reconcile(&base, &snapshot(&[("A", "2")]), &remote(&[("A", "3")]));
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.local.as_deref(), Some("2"));
        assert_eq!(conflict.remote.as_deref(), Some("3"));
        assert_eq!(conflict.winner, Direction::Pull);
        assert_eq!(
            local_updates(&result).upserts.get("A").map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn test_most_recent_policy_prefers_newer_local_file() {
        let base = snapshot(&[("A", "1")]);
        let options = ReconcileOptions {
            policy: ConflictPolicy::MostRecent,
            local_modified_at: Some(Utc::now() + Duration::hours(1)),
        };
        let theirs = remote(&[("A", "3")]);
        let result = reconcile_with(&base, &snapshot(&[("A", "2")]), &theirs, &options);
        assert_eq!(result.conflicts[0].winner, Direction::Push);
        assert_eq!(
            remote_updates(&result, &theirs),
            vec![RemoteWrite::Update {
                entity_id: "id-A".into(),
                key: "A".into(),
                value: "2".into(),
            }]
        );
    }

    #[test]
    fn test_one_sided_keys_without_baseline() {
        let theirs = remote(&[("R", "r")]);
        let result = reconcile(&Snapshot::new(), &snapshot(&[("L", "l")]), &theirs);
        assert_eq!(
            remote_updates(&result, &theirs),
            vec![RemoteWrite::Create {
                key: "L".into(),
                value: "l".into(),
            }]
        );
        assert!(local_updates(&result).upserts.contains_key("R"));
    }

    #[test]
    fn test_deletions_propagate() {
        let base = snapshot(&[("GONE_LOCAL", "1"), ("GONE_REMOTE", "2")]);
        let local = snapshot(&[("GONE_REMOTE", "2")]);
        let theirs = remote(&[("GONE_LOCAL", "1")]);
        let result = reconcile(&base, &local, &theirs);

        assert_eq!(
            remote_updates(&result, &theirs),
            vec![RemoteWrite::Delete {
                entity_id: "id-GONE_LOCAL".into(),
                key: "GONE_LOCAL".into(),
            }]
        );
        assert!(local_updates(&result).removals.contains("GONE_REMOTE"));
        assert!(next_baseline(&base, &result, &local, &theirs).is_empty());
    }

    #[test]
    fn test_output_sorted_by_key() {
        let theirs = remote(&[("B", "1"), ("D", "1")]);
        let result = reconcile(
            &Snapshot::new(),
            &snapshot(&[("C", "1"), ("A", "1")]),
            &theirs,
        );
        let keys: Vec<&str> = result.applied.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_next_baseline_keeps_failed_key() {
        let base = snapshot(&[("A", "1"), ("B", "1")]);
        let local = snapshot(&[("A", "2"), ("B", "2")]);
        let theirs = remote(&[("A", "1"), ("B", "1")]);
        let mut result = reconcile(&base, &local, &theirs);
        result.mark_failed("B", "unavailable");

        let next = next_baseline(&base, &result, &local, &theirs);
        assert_eq!(next, snapshot(&[("A", "2"), ("B", "1")]));

        // Same classification on the retry
        let retry = reconcile(&next, &local, &remote(&[("A", "2"), ("B", "1")]));
        assert_eq!(retry.applied.len(), 1);
        assert_eq!(retry.applied[0].key, "B");
        assert_eq!(retry.applied[0].direction, Direction::Push);
    }
}
