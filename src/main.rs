//! slotbot - slot-machine game engine for group chats
//!
//! Rolls, streaks, duels and domain expansions, served to chat bridges over
//! a local TCP gateway.

mod config;
mod engine;
mod error;
mod game;
mod network;
mod stats;
mod storage;

use clap::{Parser, Subcommand};
use config::EngineConfig;
use engine::notify::BroadcastNotifier;
use engine::Engine;
use network::Server;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{SqliteStore, StateStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Notices buffered per bridge before a slow one starts losing them
const NOTICE_BUFFER: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "slotbot", version, about = "Slot-machine game engine for group chats")]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway listen address (host:port)
    #[arg(long)]
    listen: Option<String>,

    /// Directory holding the database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "slotbot=debug"
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway (default)
    Serve,
    /// Load legacy JSON files into the store
    Import {
        /// Legacy scores file
        scores: PathBuf,
        /// Legacy duel log
        #[arg(long)]
        duels: Option<PathBuf>,
        /// Legacy users directory
        #[arg(long)]
        users: Option<PathBuf>,
    },
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotbot=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let mut store = SqliteStore::open(config.data_dir.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::Import { scores, duels, users } => {
            import(&mut store, &scores, duels.as_deref(), users.as_deref())
        }
    }
}

async fn serve(config: EngineConfig, store: SqliteStore) -> Result<(), Box<dyn Error>> {
    let notifier = BroadcastNotifier::new(NOTICE_BUFFER);
    let server = Server::bind(&config.listen).await?;
    let engine = Arc::new(Engine::new(config, Box::new(store), Arc::new(notifier.clone())));

    tokio::select! {
        _ = server.run(engine, notifier) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
        }
    }
    Ok(())
}

fn import(
    store: &mut SqliteStore,
    scores: &Path,
    duels: Option<&Path>,
    users: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let imported = storage::migrate::import_legacy_scores(&std::fs::read_to_string(scores)?)?;
    for key in &imported.rejected {
        warn!(key = %key, "record not imported");
    }
    if imported.book.is_empty() {
        warn!(path = %scores.display(), "scores file held no importable records");
    }
    let mut book = store.load_players();
    for (id, record) in imported.book.iter() {
        book.insert(id, record.clone());
    }
    store.save_players(&book)?;
    info!(
        records = imported.book.len(),
        rejected = imported.rejected.len(),
        version = imported.source_version,
        "scores imported"
    );

    if let Some(path) = duels {
        let entries = storage::migrate::import_legacy_duels(&std::fs::read_to_string(path)?)?;
        let mut history = store.load_duel_history();
        history.extend(entries.iter().cloned());
        store.save_duel_history(&history)?;
        info!(entries = entries.len(), "duel log imported");
    }

    if let Some(path) = users {
        let names = storage::migrate::import_legacy_users(&std::fs::read_to_string(path)?)?;
        let mut directory = store.load_directory();
        let count = names.len();
        directory.extend(names);
        store.save_directory(&directory)?;
        info!(users = count, "user directory imported");
    }
    Ok(())
}
