//! CLI command definitions for eisenhower-board
//!
//! The `Cli` struct carries global overrides; with no subcommand the HTTP
//! server starts.

pub mod export;

use clap::{Parser, Subcommand};
use export::ExportArgs;
use std::path::PathBuf;

/// Eisenhower matrix board server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (skips the project and user tiers)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Directory holding the browser client
    #[arg(long, global = true)]
    pub static_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Export one user's board as JSON
    Export(ExportArgs),
}
