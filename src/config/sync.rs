//! # Sync Configuration
//!
//! The `envzip.config` file written by `envzip init`.
//!
//! Format is the env file format (see [`crate::parser`]): one `key=value` per
//! line, blank lines and `#` comments skipped, values may themselves contain `=`. Required fields are checked
//! on load so a broken config fails before any sync runs.

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::constants::{CONFIG_FILE_NAME, DEFAULT_AUTHOR, DEFAULT_REMOTE_ENDPOINT};
use crate::error::ConfigError;
use crate::model::{Snapshot, Stage};
use crate::parser;
use crate::store::write_atomic;

static ENTRY_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$")
        .expect("Failed to compile ENTRY_KEY_REGEX - this should never happen")
});

/// True when `key` is accepted by the remote store as an entry key
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    ENTRY_KEY_REGEX.is_match(key)
}

/// Settings binding a local env file to a remote project/stage
#[derive(Clone)]
pub struct SyncConfig {
    pub api_key: Zeroizing<String>,
    pub project_key: String,
    /// As written in the config file; see [`SyncConfig::env_file_path`]
    pub local_env_path: PathBuf,
    pub stage: Stage,
    pub remote_endpoint: String,
    pub author: Option<String>,
    /// Directory the config was loaded from
    base_dir: PathBuf,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("project_key", &self.project_key)
            .field("local_env_path", &self.local_env_path)
            .field("stage", &self.stage)
            .field("remote_endpoint", &self.remote_endpoint)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

impl SyncConfig {
    pub fn new(
        api_key: impl Into<String>,
        project_key: impl Into<String>,
        local_env_path: impl Into<PathBuf>,
        stage: Stage,
    ) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.into()),
            project_key: project_key.into(),
            local_env_path: local_env_path.into(),
            stage,
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            author: None,
            base_dir: PathBuf::from("."),
        }
    }

    /// Path of the config file inside `dir`
    #[must_use]
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    /// Load `envzip.config` from `dir`
    pub async fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::file_in(dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        debug!("Loaded {}", path.display());
        Self::parse(&content, dir)
    }

    /// Parse config text; relative paths resolve against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut fields = parser::parse(content);
        fields.retain(|_, value| !value.is_empty());

        // Older config files used these names
        let api_key = take_field(&mut fields, &["api_key", "envzip_key"])
            .ok_or(ConfigError::MissingField("api_key"))?;
        let project_key = take_field(&mut fields, &["project_key", "projectkey"])
            .ok_or(ConfigError::MissingField("project_key"))?;
        let local_env_path = take_field(&mut fields, &["local_env_path"])
            .ok_or(ConfigError::MissingField("local_env_path"))?;
        let stage: Stage = take_field(&mut fields, &["stage"])
            .ok_or(ConfigError::MissingField("stage"))?
            .parse()?;

        let remote_endpoint = take_field(&mut fields, &["remote_endpoint"])
            .unwrap_or_else(|| DEFAULT_REMOTE_ENDPOINT.to_string());
        if !remote_endpoint.starts_with("http://") && !remote_endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "remote_endpoint",
                reason: format!("'{remote_endpoint}' is not an http(s) URL"),
            });
        }

        Ok(Self {
            api_key: Zeroizing::new(api_key),
            project_key,
            local_env_path: PathBuf::from(local_env_path),
            stage,
            remote_endpoint: remote_endpoint.trim_end_matches('/').to_string(),
            author: take_field(&mut fields, &["author"]),
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Write the config to `dir/envzip.config`
    ///
    /// A new file is readable by its owner only since it holds the API key.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = Self::file_in(dir);
        write_atomic(&path, self.render().as_bytes()).await?;
        Ok(path)
    }

    fn render(&self) -> String {
        let mut lines = vec![
            parser::format_line("api_key", self.api_key.as_str()),
            parser::format_line("project_key", &self.project_key),
            parser::format_line("local_env_path", &self.local_env_path.to_string_lossy()),
            parser::format_line("stage", self.stage.as_str()),
            parser::format_line("remote_endpoint", &self.remote_endpoint),
        ];
        if let Some(author) = &self.author {
            lines.push(parser::format_line("author", author));
        }
        lines.join("\n")
    }

    /// Absolute (or base-relative) path of the local env file
    #[must_use]
    pub fn env_file_path(&self) -> PathBuf {
        if self.local_env_path.is_absolute() {
            self.local_env_path.clone()
        } else {
            self.base_dir.join(&self.local_env_path)
        }
    }

    /// Author recorded on version records
    #[must_use]
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|user| !user.is_empty()))
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string())
    }
}

fn take_field(fields: &mut Snapshot, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| fields.remove(*name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "# envzip\napi_key=abc=def\nproject_key=proj\nlocal_env_path=.env\nstage=staging\n";

    #[test]
    fn test_parse_valid_config() {
        let config = SyncConfig::parse(VALID, Path::new("/work")).unwrap();
        assert_eq!(config.api_key.as_str(), "abc=def");
        assert_eq!(config.project_key, "proj");
        assert_eq!(config.stage, Stage::Staging);
        assert_eq!(config.remote_endpoint, DEFAULT_REMOTE_ENDPOINT);
        assert_eq!(config.env_file_path(), PathBuf::from("/work/.env"));
        assert!(config.author.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let err = SyncConfig::parse("api_key=x\nstage=dev\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("project_key")));
    }

    #[test]
    fn test_invalid_stage() {
        let text = "api_key=x\nproject_key=p\nlocal_env_path=.env\nstage=qa\n";
        let err = SyncConfig::parse(text, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStage(_)));
    }

    #[test]
    fn test_legacy_field_names() {
        let text = "envzip_key=x\nprojectkey=p\nlocal_env_path=/abs/.env\nstage=prod\n";
        let config = SyncConfig::parse(text, Path::new("/work")).unwrap();
        assert_eq!(config.project_key, "p");
        assert_eq!(config.env_file_path(), PathBuf::from("/abs/.env"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = SyncConfig::parse(VALID, Path::new(".")).unwrap();
        assert!(!format!("{config:?}").contains("abc=def"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SyncConfig::new("key", "proj", ".env", Stage::Production);
        config.author = Some("alice".into());
        config.save(dir.path()).await.unwrap();

        let loaded = SyncConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded.api_key.as_str(), "key");
        assert_eq!(loaded.stage, Stage::Production);
        assert_eq!(loaded.author(), "alice");
        assert_eq!(loaded.env_file_path(), dir.path().join(".env"));
    }

    #[test]
    fn test_quoted_values_are_unquoted() {
        let text = "api_key=\"k\"\nproject_key='proj'\nlocal_env_path=.env\nstage=dev\nauthor=\"Jane Doe\"\n";
        let config = SyncConfig::parse(text, Path::new(".")).unwrap();
        assert_eq!(config.api_key.as_str(), "k");
        assert_eq!(config.project_key, "proj");
        assert_eq!(config.author.as_deref(), Some("Jane Doe"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::new("key", "proj", ".env", Stage::Development);
        let path = config.save(dir.path()).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, crate::constants::PRIVATE_FILE_MODE);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("DATABASE_URL"));
        assert!(is_valid_key("_private.key-1"));
        assert!(!is_valid_key("1BAD"));
        assert!(!is_valid_key("HAS SPACE"));
    }
}
