//! # Init Command
//!
//! Writes `envzip.config` and creates the local env file if it is missing.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use envzip::config::SyncConfig;
use envzip::constants::NEW_ENV_FILE_HEADER;
use envzip::model::Stage;
use envzip::store::LocalStore;

pub struct InitOptions {
    pub api_key: String,
    pub project_key: String,
    pub env_path: PathBuf,
    pub stage: Stage,
    pub endpoint: Option<String>,
    pub author: Option<String>,
    pub force: bool,
}

pub async fn init_command(dir: &Path, options: InitOptions) -> Result<()> {
    println!("🔧 Initializing envzip configuration...");

    let config_path = SyncConfig::file_in(dir);
    if !options.force
        && tokio::fs::try_exists(&config_path)
            .await
            .with_context(|| format!("Failed to check {}", config_path.display()))?
    {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }

    let mut config = SyncConfig::new(
        options.api_key,
        options.project_key,
        options.env_path,
        options.stage,
    );
    if let Some(endpoint) = options.endpoint {
        config.remote_endpoint = endpoint;
    }
    config.author = options.author;

    let saved = config
        .save(dir)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    // Reload so the written file goes through the same validation as every other command
    let config = SyncConfig::load(dir)
        .await
        .with_context(|| format!("Invalid configuration written to {}", saved.display()))?;
    println!("✅ Configuration saved to {}", saved.display());

    let env_path = config.env_file_path();
    let created = LocalStore::new(&env_path)
        .create_if_missing(NEW_ENV_FILE_HEADER)
        .await
        .with_context(|| format!("Failed to create {}", env_path.display()))?;
    if created {
        println!("✅ Created {}", env_path.display());
    }

    println!();
    println!("Project: {} ({})", config.project_key, config.stage);
    println!("Run \"envzip pull\" to fetch the current variables.");
    Ok(())
}
