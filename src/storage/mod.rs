//! Persistent storage using SQLite (rusqlite)
//!
//! This module provides:
//! - The `StateStore` seam the engine loads and saves through
//! - OS-standard data directory location (via `directories` crate)
//! - SQLite database with schema versioning
//! - An in-memory store for tests (`memory`)
//! - Record upgrade and legacy JSON import (`migrate`)
//!
//! Loads never fail: an unreadable store is logged and treated as empty.
//! Saves overwrite the whole collection inside one transaction.

#[cfg(test)]
pub mod memory;
pub mod migrate;

use crate::error::StorageError;
use crate::game::duel::DuelHistoryEntry;
use crate::game::UserId;
use crate::stats::RecordBook;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(test)]
pub use memory::MemoryStore;

/// Current schema version. Bump this when making schema changes.
/// Version history:
/// - v1: meta, players and duel_history tables
/// - v2: Added users directory table
const SCHEMA_VERSION: u32 = 2;

/// Database file name inside the data directory
const DB_FILE: &str = "slotbot.db";

/// User id → display name, as seen on the last trial.
pub type Directory = BTreeMap<UserId, String>;

/// Load/save interface between the engine and whatever keeps its state.
pub trait StateStore: Send {
    /// All player records; empty when nothing is stored or it is unreadable.
    fn load_players(&self) -> RecordBook;
    /// Replace every stored player record.
    fn save_players(&mut self, book: &RecordBook) -> Result<(), StorageError>;
    /// The duel log, oldest first.
    fn load_duel_history(&self) -> Vec<DuelHistoryEntry>;
    /// Replace the duel log.
    fn save_duel_history(&mut self, history: &[DuelHistoryEntry]) -> Result<(), StorageError>;
    /// The user directory.
    fn load_directory(&self) -> Directory;
    /// Replace the user directory.
    fn save_directory(&mut self, directory: &Directory) -> Result<(), StorageError>;
}

/// SQLite-backed state store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database in `data_dir`, or in the OS-standard
    /// data directory when none is given:
    /// - Linux: `$XDG_DATA_HOME/slotbot/` or `~/.local/share/slotbot/`
    /// - macOS: `~/Library/Application Support/slotbot/`
    pub fn open(data_dir: Option<&Path>) -> Result<Self, StorageError> {
        let dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_data_dir()?,
        };
        std::fs::create_dir_all(&dir)?;
        Self::open_file(&dir.join(DB_FILE))
    }

    /// Open or create a database file.
    pub fn open_file(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = SqliteStore { conn };
        store.initialize_schema()?;
        info!(path = %path.display(), "state store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Get the OS-standard data directory.
    pub fn default_data_dir() -> Result<PathBuf, StorageError> {
        ProjectDirs::from("", "", "slotbot")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(StorageError::NoDataDirectory)
    }

    // === Schema ===

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let current_version = self.get_schema_version()?;

        if current_version == 0 {
            // Fresh database: lay down v1, then walk the migrations
            self.create_schema_v1()?;
            self.migrate_schema(1)?;
        } else if current_version < SCHEMA_VERSION {
            self.migrate_schema(current_version)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(StorageError::FutureSchemaVersion {
                found: current_version,
                supported: SCHEMA_VERSION,
            });
        }

        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StorageError> {
        let table_exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: u32 = self
            .conn
            .query_row("SELECT schema_version FROM meta LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        Ok(version)
    }

    fn create_schema_v1(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            -- Meta table: schema and record layout versions
            CREATE TABLE meta (
                schema_version INTEGER NOT NULL,
                record_version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- One JSON-encoded PlayerRecord per user
            CREATE TABLE players (
                user_id INTEGER PRIMARY KEY,
                record TEXT NOT NULL
            );

            -- Append-only duel log; id gives the order
            CREATE TABLE duel_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                p1 TEXT NOT NULL,
                p2 TEXT NOT NULL,
                score1 INTEGER NOT NULL,
                score2 INTEGER NOT NULL,
                winner TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            "#,
        )?;

        let created_at = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO meta (schema_version, record_version, created_at) VALUES (1, ?1, ?2)",
            params![migrate::RECORD_VERSION, created_at],
        )?;

        Ok(())
    }

    fn migrate_schema(&self, from_version: u32) -> Result<(), StorageError> {
        let mut current_version = from_version;

        while current_version < SCHEMA_VERSION {
            match current_version {
                1 => {
                    self.migrate_v1_to_v2()?;
                    current_version = 2;
                }
                _ => {
                    return Err(StorageError::MigrationFailed {
                        from: current_version,
                        to: SCHEMA_VERSION,
                        reason: format!("no migration path from version {}", current_version),
                    });
                }
            }
        }

        self.conn.execute(
            "UPDATE meta SET schema_version = ?1",
            params![SCHEMA_VERSION],
        )?;
        debug!(from = from_version, to = SCHEMA_VERSION, "schema migrated");

        Ok(())
    }

    /// Migrate from schema v1 to v2: add the users directory
    fn migrate_v1_to_v2(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // === Fallible loads ===

    fn try_load_players(&self) -> Result<RecordBook, StorageError> {
        let mut stmt = self.conn.prepare("SELECT user_id, record FROM players")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut book = RecordBook::new();
        for row in rows {
            let (id, text) = row?;
            let record = serde_json::from_str(&text)
                .map_err(StorageError::from)
                .and_then(migrate::upgrade_record);
            match record {
                Ok(record) => book.insert(id, record),
                Err(e) => warn!(user = id, error = %e, "dropping unreadable player record"),
            }
        }
        Ok(book)
    }

    fn try_load_duel_history(&self) -> Result<Vec<DuelHistoryEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p1, p2, score1, score2, winner, timestamp FROM duel_history ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut history = Vec::new();
        for row in rows {
            let (p1, p2, score1, score2, winner, ts) = row?;
            match migrate::parse_timestamp(&ts) {
                Some(timestamp) => history.push(DuelHistoryEntry {
                    p1,
                    p2,
                    score1,
                    score2,
                    winner,
                    timestamp,
                }),
                None => warn!(timestamp = %ts, "dropping duel entry with bad timestamp"),
            }
        }
        Ok(history)
    }

    fn try_load_directory(&self) -> Result<Directory, StorageError> {
        let mut stmt = self.conn.prepare("SELECT user_id, name FROM users")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut directory = Directory::new();
        for row in rows {
            let (id, name) = row?;
            directory.insert(id, name);
        }
        Ok(directory)
    }
}

impl StateStore for SqliteStore {
    fn load_players(&self) -> RecordBook {
        self.try_load_players().unwrap_or_else(|e| {
            warn!(error = %e, "player records unreadable, starting empty");
            RecordBook::new()
        })
    }

    fn save_players(&mut self, book: &RecordBook) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM players", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO players (user_id, record) VALUES (?1, ?2)")?;
            for (id, record) in book.iter() {
                insert.execute(params![id, serde_json::to_string(record)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_duel_history(&self) -> Vec<DuelHistoryEntry> {
        self.try_load_duel_history().unwrap_or_else(|e| {
            warn!(error = %e, "duel history unreadable, starting empty");
            Vec::new()
        })
    }

    fn save_duel_history(&mut self, history: &[DuelHistoryEntry]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM duel_history", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO duel_history (p1, p2, score1, score2, winner, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in history {
                insert.execute(params![
                    entry.p1,
                    entry.p2,
                    entry.score1,
                    entry.score2,
                    entry.winner,
                    entry.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_directory(&self) -> Directory {
        self.try_load_directory().unwrap_or_else(|e| {
            warn!(error = %e, "user directory unreadable, starting empty");
            Directory::new()
        })
    }

    fn save_directory(&mut self, directory: &Directory) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM users", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO users (user_id, name) VALUES (?1, ?2)")?;
            for (id, name) in directory {
                insert.execute(params![id, name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
