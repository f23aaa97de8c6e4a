//! # Metrics
//!
//! Prometheus metrics for monitoring sync activity.
//!
//! ## Metrics Exposed
//!
//! - `envzip_syncs_total` - Total number of sync passes
//! - `envzip_sync_errors_total` - Total number of sync passes that aborted
//! - `envzip_sync_duration_seconds` - Duration of sync passes
//! - `envzip_keys_pushed_total` - Keys written to the remote store
//! - `envzip_keys_pulled_total` - Keys written to the local env file
//! - `envzip_conflicts_total` - Keys changed on both sides since the baseline
//! - `envzip_key_failures_total` - Per-key remote write failures
//! - `envzip_triggers_coalesced_total` - Triggers dropped while a sync was running
//! - `envzip_versions_recorded_total` - Version records written
//! - `envzip_version_record_failures_total` - Version records that could not be written
//! - `envzip_remote_operations_total` - Remote store calls by operation
//! - `envzip_remote_operation_errors_total` - Failed remote store calls by operation

use anyhow::Result;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REGISTER: Once = Once::new();

static SYNCS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("envzip_syncs_total", "Total number of sync passes")
        .expect("Failed to create SYNCS_TOTAL metric - this should never happen")
});

static SYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_sync_errors_total",
        "Total number of sync passes that aborted with an error",
    )
    .expect("Failed to create SYNC_ERRORS_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "envzip_sync_duration_seconds",
            "Duration of sync passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static KEYS_PUSHED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_keys_pushed_total",
        "Total number of keys written to the remote store",
    )
    .expect("Failed to create KEYS_PUSHED_TOTAL metric - this should never happen")
});

static KEYS_PULLED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_keys_pulled_total",
        "Total number of keys written to the local env file",
    )
    .expect("Failed to create KEYS_PULLED_TOTAL metric - this should never happen")
});

static CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_conflicts_total",
        "Total number of keys changed on both sides since the last sync",
    )
    .expect("Failed to create CONFLICTS_TOTAL metric - this should never happen")
});

static KEY_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_key_failures_total",
        "Total number of per-key remote write failures",
    )
    .expect("Failed to create KEY_FAILURES_TOTAL metric - this should never happen")
});

static TRIGGERS_COALESCED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_triggers_coalesced_total",
        "Total number of sync triggers dropped because a sync was already running",
    )
    .expect("Failed to create TRIGGERS_COALESCED_TOTAL metric - this should never happen")
});

static VERSIONS_RECORDED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_versions_recorded_total",
        "Total number of version records written",
    )
    .expect("Failed to create VERSIONS_RECORDED_TOTAL metric - this should never happen")
});

static VERSION_RECORD_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "envzip_version_record_failures_total",
        "Total number of version records that could not be written",
    )
    .expect("Failed to create VERSION_RECORD_FAILURES_TOTAL metric - this should never happen")
});

static REMOTE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "envzip_remote_operations_total",
            "Total number of remote store operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create REMOTE_OPERATIONS_TOTAL metric - this should never happen")
});

static REMOTE_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "envzip_remote_operation_errors_total",
            "Total number of failed remote store operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create REMOTE_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry
///
/// Safe to call more than once; only the first call registers.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    let mut result = Ok(());
    REGISTER.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> Result<()> {
    REGISTRY.register(Box::new(SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(KEYS_PUSHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYS_PULLED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEY_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRIGGERS_COALESCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VERSIONS_RECORDED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VERSION_RECORD_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_OPERATION_ERRORS_TOTAL.clone()))?;
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_syncs() {
    SYNCS_TOTAL.inc();
}

pub fn increment_sync_errors() {
    SYNC_ERRORS_TOTAL.inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

pub fn increment_keys_pushed(count: usize) {
    KEYS_PUSHED_TOTAL.inc_by(count as u64);
}

pub fn increment_keys_pulled(count: usize) {
    KEYS_PULLED_TOTAL.inc_by(count as u64);
}

pub fn increment_conflicts(count: usize) {
    CONFLICTS_TOTAL.inc_by(count as u64);
}

pub fn increment_key_failures(count: usize) {
    KEY_FAILURES_TOTAL.inc_by(count as u64);
}

pub fn increment_triggers_coalesced() {
    TRIGGERS_COALESCED_TOTAL.inc();
}

pub fn increment_versions_recorded() {
    VERSIONS_RECORDED_TOTAL.inc();
}

pub fn increment_version_record_failures() {
    VERSION_RECORD_FAILURES_TOTAL.inc();
}

pub fn record_remote_operation(operation: &str) {
    REMOTE_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_remote_operation_errors(operation: &str) {
    REMOTE_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_syncs() {
        let before = SYNCS_TOTAL.get();
        increment_syncs();
        assert_eq!(SYNCS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_increment_keys_pushed() {
        let before = KEYS_PUSHED_TOTAL.get();
        increment_keys_pushed(3);
        assert_eq!(KEYS_PUSHED_TOTAL.get(), before + 3u64);
    }

    #[test]
    fn test_increment_triggers_coalesced() {
        let before = TRIGGERS_COALESCED_TOTAL.get();
        increment_triggers_coalesced();
        assert_eq!(TRIGGERS_COALESCED_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_record_remote_operation() {
        let before = REMOTE_OPERATIONS_TOTAL.with_label_values(&["list"]).get();
        record_remote_operation("list");
        let after = REMOTE_OPERATIONS_TOTAL.with_label_values(&["list"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        register_metrics().unwrap();
        increment_conflicts(1);
        let text = render().unwrap();
        assert!(text.contains("envzip_conflicts_total"));
    }
}
