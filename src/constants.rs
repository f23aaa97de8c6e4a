//! # Constants
//!
//! Shared constants used throughout envzip.
//!
//! These values represent reasonable defaults and can be overridden via
//! the config file or environment variables where applicable.

/// Name of the per-directory sync configuration file
pub const CONFIG_FILE_NAME: &str = "envzip.config";

/// Default local env file created by `envzip init`
pub const DEFAULT_LOCAL_ENV_PATH: &str = ".env";

/// Default remote store endpoint when `remote_endpoint` is not configured
pub const DEFAULT_REMOTE_ENDPOINT: &str = "http://localhost:8787/v1";

/// Suffix of the last-synced baseline file written next to the env file
pub const BASELINE_FILE_SUFFIX: &str = ".envzip-state.json";

/// Unix mode of files envzip creates (env file, baseline, config)
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Header written into a freshly created env file
pub const NEW_ENV_FILE_HEADER: &str = "# Environment variables\n";

/// Fallback author when neither the config nor `$USER` names one
pub const DEFAULT_AUTHOR: &str = "envzip-cli";

/// Default debounce for local file change events (milliseconds)
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 250;

/// Default polling interval for remote change detection (seconds)
pub const DEFAULT_REMOTE_POLL_INTERVAL_SECS: u64 = 5;

/// Default HTTP request timeout for the remote store (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of records returned by project history queries
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Number of records included in version statistics' recent activity
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Remote poll error backoff bounds (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 60;

/// Capacity of remote event channels
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Message attached to version records written by the ledger
pub const MESSAGE_INITIAL_VERSION: &str = "Initial version";
pub const MESSAGE_VARIABLE_UPDATED: &str = "Variable updated";
pub const MESSAGE_VARIABLE_DELETED: &str = "Variable deleted";
