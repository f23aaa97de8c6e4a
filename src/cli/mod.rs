//! # envzip CLI
//!
//! Command-line interface for keeping a local env file in sync with the
//! shared remote store.
//!
//! ## Usage
//!
//! ```bash
//! # Write envzip.config and create the env file
//! envzip init --api-key KEY --project-key my-app --stage development
//!
//! # One-off passes
//! envzip pull
//! envzip push
//! envzip sync
//!
//! # Keep syncing on file changes; --dashboard also follows remote edits
//! envzip watch --dashboard
//!
//! # Pending work and last sync time
//! envzip status
//!
//! # Version history and rollback
//! envzip history --key DATABASE_URL
//! envzip rollback <version-id> --field value
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use envzip::config::{RuntimeConfig, SyncConfig};
use envzip::controller::reconciler::SyncMode;
use envzip::controller::{
    EntryService, RollbackEngine, Session, SyncOrchestrator, SyncTarget, VersionLedger,
};
use envzip::model::Stage;
use envzip::provider::rest::RestRemoteStore;
use envzip::provider::VersionStore;

mod history;
mod init;
mod rollback;
mod status;
mod sync;
mod watch;

/// envzip: env file sync and versioning
#[derive(Parser)]
#[command(name = "envzip", version)]
#[command(
    about = "Keep a local .env file in sync with a shared remote store",
    long_about = None,
    after_help = "\
Examples:
  envzip init --api-key KEY --project-key my-app --stage development
  envzip sync
  envzip watch --dashboard
  envzip history --key DATABASE_URL --limit 10
"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing envzip.config
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write envzip.config and create the local env file if missing
    Init {
        /// API key for the remote store
        #[arg(long)]
        api_key: String,

        /// Project the env file belongs to
        #[arg(long)]
        project_key: String,

        /// Path of the local env file, relative to the config directory
        #[arg(long, default_value = envzip::constants::DEFAULT_LOCAL_ENV_PATH)]
        env_path: PathBuf,

        /// Stage to sync: development, staging or production
        #[arg(long, default_value = "development")]
        stage: Stage,

        /// Remote store base URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Author recorded on version history (defaults to $USER)
        #[arg(long)]
        author: Option<String>,

        /// Overwrite an existing envzip.config
        #[arg(long)]
        force: bool,
    },
    /// Apply remote changes to the local env file
    Pull,
    /// Send local changes to the remote store
    Push,
    /// Pull and push in one pass
    Sync,
    /// Sync whenever the env file changes, until Ctrl+C
    Watch {
        /// Also sync when the remote store changes
        #[arg(long)]
        dashboard: bool,
    },
    /// Show pending changes and the last sync time
    Status {
        /// Also print the Prometheus metrics of this run
        #[arg(long)]
        metrics: bool,
    },
    /// Show version history for the configured stage or a single key
    History {
        /// Only this key
        #[arg(long)]
        key: Option<String>,

        /// Maximum number of records
        #[arg(long)]
        limit: Option<usize>,

        /// Print project-wide statistics instead of records
        #[arg(long)]
        stats: bool,
    },
    /// Restore an earlier state as a new version
    Rollback {
        /// Version record to roll back to
        #[arg(value_name = "VERSION_ID")]
        version_id: String,

        /// Only restore this field (value, description or kind)
        #[arg(long)]
        field: Option<String>,

        /// Show the state that would be restored without changing anything
        #[arg(long, conflicts_with = "field")]
        preview: bool,
    },
}

/// Everything a command needs once envzip.config is loaded
pub(crate) struct Workspace {
    pub config: SyncConfig,
    pub runtime: RuntimeConfig,
    pub entries: EntryService,
    pub session: Session,
}

impl Workspace {
    async fn load(dir: &Path, runtime: RuntimeConfig) -> Result<Self> {
        let config = SyncConfig::load(dir)
            .await
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;
        let store = Arc::new(
            RestRemoteStore::new(&config, &runtime).context("Failed to create remote store client")?,
        );
        let versions: Arc<dyn VersionStore> = Arc::<RestRemoteStore>::clone(&store);
        let ledger = VersionLedger::new(versions);
        let entries = EntryService::new(store, ledger);
        let session = Session::new(config.author());
        Ok(Self {
            config,
            runtime,
            entries,
            session,
        })
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.entries.clone(),
            SyncTarget::from_config(&self.config),
            self.session.clone(),
        )
        .with_policy(self.runtime.conflict_policy)
    }

    pub fn rollback(&self) -> RollbackEngine {
        RollbackEngine::new(self.entries.clone())
    }
}

pub async fn run(cli: Cli, runtime: RuntimeConfig) -> Result<()> {
    match cli.command {
        Commands::Init {
            api_key,
            project_key,
            env_path,
            stage,
            endpoint,
            author,
            force,
        } => {
            let options = init::InitOptions {
                api_key,
                project_key,
                env_path,
                stage,
                endpoint,
                author,
                force,
            };
            init::init_command(&cli.dir, options).await
        }
        Commands::Pull => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            sync::sync_command(&workspace, SyncMode::Pull).await
        }
        Commands::Push => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            sync::sync_command(&workspace, SyncMode::Push).await
        }
        Commands::Sync => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            sync::sync_command(&workspace, SyncMode::Both).await
        }
        Commands::Watch { dashboard } => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            watch::watch_command(&workspace, dashboard).await
        }
        Commands::Status { metrics } => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            status::status_command(&workspace, metrics).await
        }
        Commands::History { key, limit, stats } => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            if stats {
                history::stats_command(&workspace).await
            } else {
                history::history_command(&workspace, key.as_deref(), limit).await
            }
        }
        Commands::Rollback {
            version_id,
            field,
            preview,
        } => {
            let workspace = Workspace::load(&cli.dir, runtime).await?;
            if preview {
                rollback::preview_command(&workspace, &version_id).await
            } else {
                rollback::rollback_command(&workspace, &version_id, field.as_deref()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_loads_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        SyncConfig::new("key", "my-app", ".env", Stage::Staging)
            .save(dir.path())
            .await
            .unwrap();

        let workspace = Workspace::load(dir.path(), RuntimeConfig::default())
            .await
            .unwrap();
        let orchestrator = workspace.orchestrator();
        assert_eq!(orchestrator.target().project_id, "my-app");
        assert_eq!(orchestrator.target().stage, Stage::Staging);
        assert_eq!(orchestrator.target().env_path, dir.path().join(".env"));
    }

    #[test]
    fn test_init_defaults_parse() {
        let cli = Cli::try_parse_from(["envzip", "init", "--api-key", "k", "--project-key", "p"])
            .unwrap();
        match cli.command {
            Commands::Init { stage, env_path, .. } => {
                assert_eq!(stage, Stage::Development);
                assert_eq!(env_path, PathBuf::from(".env"));
            }
            _ => panic!("expected init"),
        }
    }
}
