//! Eisenhower Board server
//!
//! Serves the JSON API and the browser client, or runs one-off CLI tools.

use anyhow::Result;
use clap::Parser;
use eisenhower_board::api::{AppState, start_server};
use eisenhower_board::cli::export::run_export;
use eisenhower_board::cli::{Cli, Command};
use eisenhower_board::config::{Config, ConfigLoader, ConfigPaths};
use eisenhower_board::db::Database;
use eisenhower_board::moves::MoveQueue;
use std::fs::OpenOptions;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How often expired sessions are purged.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_with_paths(ConfigPaths::with_file(path))?,
        None => ConfigLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        info!("Loaded {} config from {}", tier, path.display());
    }

    // CLI flags win over files and environment
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(static_dir) = &cli.static_dir {
        config.server.static_dir = Some(static_dir.clone());
    }

    let config = loader.into_config();

    match cli.command {
        Some(Command::Export(args)) => {
            let db = Database::open(&config.server.db_path)?;
            run_export(&db, &args)?;
        }
        Some(Command::Serve) | None => run_server(config).await?,
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        "Starting Eisenhower board v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Database: {:?}", config.server.db_path);
    match &config.server.static_dir {
        Some(dir) => info!("Static client: {:?}", dir),
        None => info!("No static client configured; serving the API only"),
    }

    let db = Database::open(&config.server.db_path)?;
    info!("Database initialized successfully");

    let moves = MoveQueue::spawn(db.clone(), &config.moves);
    let state = AppState::new(db.clone(), config.server, moves.clone());
    let (shutdown_tx, addr, server) = start_server(state).await?;
    info!("Server ready on http://{}", addr);

    let purge_db = db.clone();
    let purger = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_db.call(|db| db.purge_expired_sessions()).await {
                Ok(0) => {}
                Ok(n) => info!("Purged {} expired session(s)", n),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        warn!("Server task ended abnormally: {}", e);
    }
    purger.abort();

    // Write out any moves still waiting for their debounce window
    if let Err(e) = moves.shutdown().await {
        warn!("Move queue did not drain cleanly: {}", e);
    }
    let stats = moves.stats();
    info!(
        applied = stats.applied,
        failed = stats.failed,
        "Move queue drained"
    );

    Ok(())
}
