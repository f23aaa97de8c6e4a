//! # Runtime Configuration
//!
//! Process-level settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::controller::reconciler::ConflictPolicy;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Runtime configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    pub log_format: LogFormat,
    /// Quiet period after a file event before a sync is triggered (milliseconds)
    pub watch_debounce_ms: u64,
    /// How often the REST adapter polls for remote changes (seconds)
    pub remote_poll_interval_secs: u64,
    /// Timeout for a single remote request (seconds)
    pub request_timeout_secs: u64,
    pub conflict_policy: ConflictPolicy,
    /// Default number of records returned by history queries
    pub history_limit: usize,
    /// Fibonacci backoff bounds for the polling subscription (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            watch_debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
            remote_poll_interval_secs: DEFAULT_REMOTE_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            conflict_policy: ConflictPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env_var_or_default_str("LOG_LEVEL", "info").to_ascii_lowercase(),
            log_format: env_var_or_default("LOG_FORMAT", LogFormat::Text),
            watch_debounce_ms: env_var_or_default(
                "ENVZIP_WATCH_DEBOUNCE_MS",
                DEFAULT_WATCH_DEBOUNCE_MS,
            ),
            remote_poll_interval_secs: env_var_or_default(
                "ENVZIP_REMOTE_POLL_INTERVAL_SECS",
                DEFAULT_REMOTE_POLL_INTERVAL_SECS,
            )
            .max(1),
            request_timeout_secs: env_var_or_default(
                "ENVZIP_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            conflict_policy: env_var_or_default("ENVZIP_CONFLICT_POLICY", ConflictPolicy::default()),
            history_limit: env_var_or_default("ENVZIP_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            backoff_min_secs: env_var_or_default(
                "ENVZIP_BACKOFF_MIN_SECS",
                DEFAULT_BACKOFF_MIN_SECS,
            )
            .max(1),
            backoff_max_secs: env_var_or_default(
                "ENVZIP_BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            ),
        }
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn remote_poll_interval(&self) -> Duration {
        Duration::from_secs(self.remote_poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.watch_debounce(), Duration::from_millis(250));
        assert_eq!(config.remote_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.conflict_policy, ConflictPolicy::RemoteWins);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        assert_eq!(env_var_or_default("ENVZIP_TEST_UNSET_VARIABLE", 7u64), 7);
    }
}
