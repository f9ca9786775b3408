//! In-process state store
//!
//! Clones share the same state, so a test can hand one clone to the engine
//! and inspect another.

use super::{Directory, StateStore};
use crate::error::StorageError;
use crate::game::duel::DuelHistoryEntry;
use crate::stats::RecordBook;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    players: RecordBook,
    history: Vec<DuelHistoryEntry>,
    directory: Directory,
    player_saves: usize,
    fail_saves: bool,
}

/// State store that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// How many times the player records were saved.
    pub fn player_saves(&self) -> usize {
        self.lock().player_saves
    }

    /// Make every following save fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.lock().fail_saves {
            return Err(StorageError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn load_players(&self) -> RecordBook {
        self.lock().players.clone()
    }

    fn save_players(&mut self, book: &RecordBook) -> Result<(), StorageError> {
        self.check()?;
        let mut inner = self.lock();
        inner.players = book.clone();
        inner.player_saves += 1;
        Ok(())
    }

    fn load_duel_history(&self) -> Vec<DuelHistoryEntry> {
        self.lock().history.clone()
    }

    fn save_duel_history(&mut self, history: &[DuelHistoryEntry]) -> Result<(), StorageError> {
        self.check()?;
        self.lock().history = history.to_vec();
        Ok(())
    }

    fn load_directory(&self) -> Directory {
        self.lock().directory.clone()
    }

    fn save_directory(&mut self, directory: &Directory) -> Result<(), StorageError> {
        self.check()?;
        self.lock().directory = directory.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let mut writer = MemoryStore::new();
        let reader = writer.clone();

        let mut book = RecordBook::new();
        book.ensure(1, "Alice").points = 3;
        writer.save_players(&book).unwrap();

        assert_eq!(reader.load_players(), book);
        assert_eq!(reader.player_saves(), 1);
    }

    #[test]
    fn test_failing_saves_leave_state() {
        let mut store = MemoryStore::new();
        store.fail_saves(true);
        let mut book = RecordBook::new();
        book.ensure(1, "Alice");
        assert!(store.save_players(&book).is_err());
        assert!(store.load_players().is_empty());
        assert_eq!(store.player_saves(), 0);
    }
}
