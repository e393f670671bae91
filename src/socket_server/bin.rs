//! Scoreboard Daemon Binary
//!
//! A WebSocket server that streams live standings per competition and accepts
//! judge submissions on the same connections.
//!
//! # Usage
//!
//! ```bash
//! scoreboard-daemon --config scoreboard.toml
//! scoreboard-daemon --port 9300 --host 0.0.0.0 --roster roster.json --scores scores.json
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use scoreboard_engine::config::{EngineConfig, DEFAULT_CONFIG_FILE};
use scoreboard_engine::roster::{MemoryRoster, RosterProvider};
use scoreboard_engine::socket_server::{handle_connection, ServerContext};
use scoreboard_engine::store::{FileScoreStore, MemoryScoreStore, ScoreStore};

/// How often expired sessions are dropped
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Scoreboard Socket Server Daemon
#[derive(Parser, Debug)]
#[command(name = "scoreboard-daemon")]
#[command(about = "Live scoring and results distribution daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Roster JSON export (overrides config)
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Score file (overrides config)
    #[arg(long)]
    scores: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load_from(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(roster) = args.roster {
        config.storage.roster_file = Some(roster);
    }
    if let Some(scores) = args.scores {
        config.storage.scores_file = Some(scores);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_directive().parse()?)
                .add_directive("scoreboard_daemon=info".parse()?),
        )
        .init();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let roster: Arc<dyn RosterProvider> = match &config.storage.roster_file {
        Some(path) => Arc::new(MemoryRoster::load_from(path)?),
        None => {
            tracing::warn!("No roster file configured, starting with an empty roster");
            Arc::new(MemoryRoster::new())
        }
    };
    let store: Arc<dyn ScoreStore> = match &config.storage.scores_file {
        Some(path) => Arc::new(FileScoreStore::open(path)?),
        None => {
            tracing::warn!("No score file configured, scores are kept in memory only");
            Arc::new(MemoryScoreStore::new())
        }
    };
    let sessions = Arc::new(config.session_registry());
    tracing::info!(
        sessions = sessions.len(),
        competitions = roster.list_active_competitions().len(),
        "Loaded configuration"
    );

    let ctx = Arc::new(ServerContext::new(&config, store, roster, sessions.clone()));

    // Periodically drop expired sessions
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::info!("Purged {} expired sessions", purged);
            }
        }
    });

    // Start the TCP listener
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Scoreboard daemon listening on ws://{}", addr);

    // Accept connections
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!("Accepted connection from {}", addr);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, ctx).await;
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}
