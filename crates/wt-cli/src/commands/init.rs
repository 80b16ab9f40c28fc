//! Init command for creating the tracking store.

use anyhow::{Context, Result};

use wt_store::{SqliteKv, Store};

use crate::Config;
use crate::config::dirs_config_path;

/// Runs the init command.
pub async fn run(config: &Config) -> Result<()> {
    if let Some(parent) = config.store_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create store directory")?;
    }
    if let Some(config_dir) = dirs_config_path() {
        std::fs::create_dir_all(&config_dir).context("failed to create config directory")?;
    }

    let kv = SqliteKv::open(&config.store_path).context("failed to open tracking store")?;
    let store = Store::new(kv);
    let created = store.ensure_initialized().await?;

    println!("Store: {}", config.store_path.display());
    if created {
        println!("Initialized empty tracking store.");
    } else {
        println!("Tracking store already present.");
    }

    Ok(())
}
