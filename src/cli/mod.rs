//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Beacon using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Beacon - Exposure Notifications key server
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "beacon.toml", env = "BEACON_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BEACON_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database schema
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show federation query bookmarks and sync history
    Status(commands::status::StatusArgs),

    /// Import a peer export payload from blob storage
    Import(commands::import::ImportArgs),
}
