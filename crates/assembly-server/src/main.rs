//! Assembly voting server
//!
//! ```bash
//! # In-memory session on the default port
//! assembly-server
//!
//! # Persistent identities and ledger (needs the heavy-state feature)
//! assembly-server --state-path ./assembly-state --bind 0.0.0.0:5000
//!
//! # Clear identities, proposals, and votes
//! assembly-server --state-path ./assembly-state wipe --yes
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use assembly_coordination::{
    EventBus, MemoryCredentialStore, MemoryLedger, SessionCoordinator, SharedCredentialStore,
    SharedEventBus, SharedLedger,
};
use assembly_server::{router, ServerConfig, VotingService};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides ASSEMBLY_BIND and the config file)
    #[arg(long)]
    bind: Option<String>,

    /// RocksDB state directory (overrides ASSEMBLY_STATE_PATH)
    #[arg(long)]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Delete every identity, proposal, and vote from the state directory
    Wipe {
        /// Confirm the deletion
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("assembly_server=info".parse()?)
                .add_directive("assembly_coordination=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_env_overrides()
        .context("Invalid ASSEMBLY_* environment")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(path) = args.state_path {
        config.state_path = Some(path);
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Wipe { yes } => wipe(&config, yes),
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let (credentials, ledger) = open_stores(&config)?;
    let events = EventBus::with_capacity(config.session.event_capacity).shared();
    spawn_event_logger(&events);

    let coordinator = SessionCoordinator::new(config.session.clone(), credentials.clone(), events)
        .context("Invalid session configuration")?
        .shared();
    let service = VotingService::new(coordinator, credentials, ledger).shared();

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        addr = %listener.local_addr()?,
        tiebreak_quorum = %config.session.tiebreak_quorum,
        "Assembly server listening"
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Assembly server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Log every session event at debug level
fn spawn_event_logger(events: &SharedEventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(
                    event = event.event_type(),
                    room = ?event.room_code().map(|code| code.as_str()),
                    "Session event"
                ),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(feature = "heavy-state")]
fn open_stores(config: &ServerConfig) -> Result<(SharedCredentialStore, SharedLedger)> {
    match &config.state_path {
        Some(path) => {
            let store = assembly_coordination::RocksStore::open(
                path,
                config.session.min_password_length,
            )
            .with_context(|| format!("Failed to open state at {}", path.display()))?
            .shared();
            info!(path = %path.display(), "Using persistent state");
            let credentials: SharedCredentialStore = store.clone();
            let ledger: SharedLedger = store;
            Ok((credentials, ledger))
        }
        None => Ok(memory_stores(config)),
    }
}

#[cfg(not(feature = "heavy-state"))]
fn open_stores(config: &ServerConfig) -> Result<(SharedCredentialStore, SharedLedger)> {
    if let Some(path) = &config.state_path {
        warn!(
            path = %path.display(),
            "Built without heavy-state; ignoring state path and keeping everything in memory"
        );
    }
    Ok(memory_stores(config))
}

fn memory_stores(config: &ServerConfig) -> (SharedCredentialStore, SharedLedger) {
    info!("Using in-memory identities and ledger");
    (
        MemoryCredentialStore::new(config.session.min_password_length).shared(),
        MemoryLedger::new().shared(),
    )
}

fn wipe(config: &ServerConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to wipe without --yes");
    }
    let Some(path) = &config.state_path else {
        println!("No state path configured; in-memory state has nothing to wipe.");
        return Ok(());
    };
    wipe_state(path, config.session.min_password_length)
}

#[cfg(feature = "heavy-state")]
fn wipe_state(path: &std::path::Path, min_password_length: usize) -> Result<()> {
    let store = assembly_coordination::RocksStore::open(path, min_password_length)
        .with_context(|| format!("Failed to open state at {}", path.display()))?;
    let report = store.wipe_all().context("Wipe failed")?;
    println!(
        "Removed {} identities, {} proposals, {} votes from {}",
        report.identities,
        report.proposals,
        report.votes,
        path.display()
    );
    Ok(())
}

#[cfg(not(feature = "heavy-state"))]
fn wipe_state(path: &std::path::Path, _min_password_length: usize) -> Result<()> {
    println!(
        "Built without heavy-state; nothing to wipe at {}.",
        path.display()
    );
    Ok(())
}
