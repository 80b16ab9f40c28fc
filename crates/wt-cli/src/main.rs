use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{init, replay, report, status};
use wt_cli::{Cli, Commands, Config};
use wt_store::{SqliteKv, Store};

/// Load config and open the tracking store, ensuring its directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(Store<SqliteKv>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.store_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create store directory")?;
    }

    let kv = SqliteKv::open(&config.store_path).context("failed to open tracking store")?;
    Ok((Store::new(kv), config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Init) => {
            let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            init::run(&config).await?;
        }
        Some(Commands::Status) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let mut stdout = std::io::stdout();
            status::run(&mut stdout, &store, &config.store_path).await?;
        }
        Some(Commands::Report {
            day,
            last_day,
            week: _,
            last_week,
            json,
            top,
            domain,
        }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let period = if *last_week {
                report::Period::LastWeek
            } else if *day {
                report::Period::Day
            } else if *last_day {
                report::Period::LastDay
            } else {
                report::Period::Week
            };
            let mut stdout = std::io::stdout();
            report::run(&mut stdout, &store, period, *json, *top, domain.as_deref()).await?;
        }
        Some(Commands::Replay { file }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let replayed = replay::run(store, file).await?;
            println!("Replayed {replayed} events");
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
