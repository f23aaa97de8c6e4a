//! # Polling Subscription
//!
//! Emulates realtime change delivery by listing a project's entries on an
//! interval and diffing against the previous listing. The first listing only
//! establishes the starting point and emits nothing.
//!
//! While the remote store is unreachable the poll interval is replaced by a
//! Fibonacci backoff, reset on the next successful listing.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::RestRemoteStore;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::controller::backoff::FibonacciBackoff;
use crate::model::Entry;
use crate::provider::{RemoteEvent, RemoteEventKind, Subscription};

pub(super) fn subscribe(store: RestRemoteStore, project_id: String) -> Subscription {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut backoff = FibonacciBackoff::new(store.backoff_min_secs, store.backoff_max_secs);
        let mut known: Option<HashMap<String, Entry>> = None;

        loop {
            let delay = match store.list_project(&project_id).await {
                Ok(entries) => {
                    backoff.reset();
                    let current: HashMap<String, Entry> =
                        entries.into_iter().map(|e| (e.id.clone(), e)).collect();
                    if let Some(previous) = &known {
                        for event in diff(previous, &current) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    known = Some(current);
                    store.poll_interval
                }
                Err(e) => {
                    let delay = backoff.next_backoff();
                    warn!(
                        "Remote poll for project {} failed, retrying in {}s: {}",
                        project_id,
                        delay.as_secs(),
                        e
                    );
                    delay
                }
            };

            if tx.is_closed() {
                debug!("Subscription for project {} closed", project_id);
                return;
            }
            tokio::time::sleep(delay).await;
        }
    });

    Subscription::new(rx, Some(task))
}

/// Events turning `previous` into `current`, ordered by key
fn diff(previous: &HashMap<String, Entry>, current: &HashMap<String, Entry>) -> Vec<RemoteEvent> {
    let mut events: Vec<RemoteEvent> = current
        .values()
        .filter_map(|entry| match previous.get(&entry.id) {
            None => Some(RemoteEvent {
                kind: RemoteEventKind::Create,
                entry: entry.clone(),
            }),
            Some(old) if old != entry => Some(RemoteEvent {
                kind: RemoteEventKind::Update,
                entry: entry.clone(),
            }),
            Some(_) => None,
        })
        .collect();

    events.extend(
        previous
            .values()
            .filter(|entry| !current.contains_key(&entry.id))
            .map(|entry| RemoteEvent {
                kind: RemoteEventKind::Delete,
                entry: entry.clone(),
            }),
    );

    events.sort_by(|a, b| a.entry.key.cmp(&b.entry.key));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Stage, ValueKind};
    use chrono::Utc;

    fn entry(id: &str, key: &str, value: &str) -> Entry {
        let now = Utc::now();
        Entry {
            id: id.into(),
            project_id: "p".into(),
            stage: Stage::Development,
            key: key.into(),
            value: value.into(),
            kind: ValueKind::String,
            description: None,
            created_at: now,
            last_modified_at: now,
            last_modified_by: "alice".into(),
        }
    }

    fn by_id(entries: Vec<Entry>) -> HashMap<String, Entry> {
        entries.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn test_diff_detects_all_change_kinds() {
        let a = entry("1", "A", "1");
        let b = entry("2", "B", "1");
        let previous = by_id(vec![a.clone(), b]);

        let mut a2 = a;
        a2.value = "2".into();
        let c = entry("3", "C", "1");
        let current = by_id(vec![a2, c]);

        let events = diff(&previous, &current);
        let summary: Vec<(&str, RemoteEventKind)> = events
            .iter()
            .map(|e| (e.entry.key.as_str(), e.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("A", RemoteEventKind::Update),
                ("B", RemoteEventKind::Delete),
                ("C", RemoteEventKind::Create),
            ]
        );
    }

    #[test]
    fn test_diff_unchanged_is_silent() {
        let previous = by_id(vec![entry("1", "A", "1")]);
        assert!(diff(&previous, &previous.clone()).is_empty());
    }
}
