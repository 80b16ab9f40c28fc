//! Webtime tracker CLI library.
//!
//! This crate provides the operational surface over the tracking store:
//! initialization, status, reports, and event-log replay.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
