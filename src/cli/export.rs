//! Export subcommand
//!
//! Writes a user's projects and task trees as pretty-printed JSON.

use crate::db::Database;
use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Account whose board is exported
    #[arg(short, long)]
    pub username: String,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Run the export against an open database.
pub fn run_export(db: &Database, args: &ExportArgs) -> Result<()> {
    let export = db.export_board(&args.username)?;
    let json = serde_json::to_string_pretty(&export)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))?;
            eprintln!(
                "Exported {} project(s) for '{}' to {}",
                export.projects.len(),
                export.user.username,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}
