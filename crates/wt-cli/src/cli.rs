//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-domain browsing time tracker.
///
/// Reconciles a browser lifecycle event stream into per-domain session and
/// focus intervals, and reports on the time they add up to.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the tracking store and config directories.
    Init,

    /// Show what is currently open in the tracking store.
    Status,

    /// Summarize tracked browsing time.
    Report {
        /// Report on today.
        #[arg(long)]
        day: bool,

        /// Report on yesterday.
        #[arg(long)]
        last_day: bool,

        /// Report on this week (default).
        #[arg(long)]
        week: bool,

        /// Report on last week.
        #[arg(long)]
        last_week: bool,

        /// Emit JSON instead of the human-readable report.
        #[arg(long)]
        json: bool,

        /// How many top sites to list.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Add an hour-by-hour breakdown for one domain.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Feed a recorded browser event log (JSONL) through the engine.
    Replay {
        /// Path to the event log.
        file: PathBuf,
    },
}
