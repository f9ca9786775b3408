//! Player records, ratings and leaderboards
//!
//! This module provides:
//! - `PlayerRecord`, the per-user aggregate every trial and duel feeds
//! - `RecordBook`, the keyed collection with lazy creation and admin setters
//! - ELO updates for duel results (`elo`)
//! - Leaderboard views over the collection (`leaderboard`)

pub mod elo;
pub mod leaderboard;

use crate::error::GameError;
use crate::game::{MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Starting rating for every player
pub const DEFAULT_ELO: i32 = 1000;

/// Unlockable achievements.
///
/// Some ids belong to minigames this engine does not run; they are kept so
/// that records carrying them survive a load/save cycle. Serialized as the
/// persisted id from [`Achievement::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Achievement {
    FirstBlood,
    Streak5,
    Streak10,
    Triple,
    Quad,
    Quint,
    Duelist,
    BotSlayer,
    TarotReader,
    LotteryWinner,
    EventMaster,
    SpeedDemon,
    Bestemmia,
}

impl From<Achievement> for &'static str {
    fn from(achievement: Achievement) -> Self {
        achievement.id()
    }
}

impl TryFrom<String> for Achievement {
    type Error = String;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Achievement::from_id(&id).ok_or_else(|| format!("unknown achievement `{}`", id))
    }
}

impl Achievement {
    /// Every known achievement.
    pub const ALL: [Achievement; 13] = [
        Achievement::FirstBlood,
        Achievement::Streak5,
        Achievement::Streak10,
        Achievement::Triple,
        Achievement::Quad,
        Achievement::Quint,
        Achievement::Duelist,
        Achievement::BotSlayer,
        Achievement::TarotReader,
        Achievement::LotteryWinner,
        Achievement::EventMaster,
        Achievement::SpeedDemon,
        Achievement::Bestemmia,
    ];

    /// Stable identifier used in persisted records.
    pub fn id(&self) -> &'static str {
        match self {
            Achievement::FirstBlood => "first_blood",
            Achievement::Streak5 => "streak_5",
            Achievement::Streak10 => "streak_10",
            Achievement::Triple => "triple",
            Achievement::Quad => "quad",
            Achievement::Quint => "quint",
            Achievement::Duelist => "duelist",
            Achievement::BotSlayer => "bot_slayer",
            Achievement::TarotReader => "tarot_reader",
            Achievement::LotteryWinner => "lottery_winner",
            Achievement::EventMaster => "event_master",
            Achievement::SpeedDemon => "speed_demon",
            Achievement::Bestemmia => "bestemmia",
        }
    }

    /// Look up an achievement by its persisted id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }

    /// Display title.
    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstBlood => "First Blood",
            Achievement::Streak5 => "Streak Master",
            Achievement::Streak10 => "Unstoppable",
            Achievement::Triple => "Triple Crown",
            Achievement::Quad => "Poker Face",
            Achievement::Quint => "Perfect Five",
            Achievement::Duelist => "Duelist",
            Achievement::BotSlayer => "Bot Slayer",
            Achievement::TarotReader => "Tarot Reader",
            Achievement::LotteryWinner => "Lottery Winner",
            Achievement::EventMaster => "Event Master",
            Achievement::SpeedDemon => "Speed Demon",
            Achievement::Bestemmia => "Sfogo",
        }
    }
}

/// Lifetime statistics for one user.
///
/// Legacy field names from older stores are accepted as aliases so a record
/// written by any previous version deserializes into the current shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    /// Display name, refreshed on every trial
    pub name: String,
    /// Total points
    pub points: i64,
    /// Current winning streak
    pub streak: u32,
    /// Longest winning streak
    pub best_streak: u32,
    /// Current losing streak
    pub sfiga: u32,
    /// Longest losing streak
    pub best_sfiga: u32,
    /// Trials recorded
    #[serde(alias = "total_slots")]
    pub total_trials: u64,
    /// Winning trials recorded
    pub total_wins: u64,
    /// Times a streak of 2 was reached
    #[serde(alias = "double")]
    pub doubles: u32,
    /// Times a streak of 3 was reached
    #[serde(alias = "triple")]
    pub triples: u32,
    /// Times a streak of 4 was reached
    #[serde(alias = "quad")]
    pub quads: u32,
    /// Times a streak of 5 was reached
    #[serde(alias = "quint")]
    pub quints: u32,
    /// Duels won
    pub duel_wins: u32,
    /// Duels lost
    pub duel_losses: u32,
    /// Duel rating
    pub elo: i32,
    /// Epoch seconds of the last trial (0 when none)
    #[serde(alias = "last_slot_ts")]
    pub last_trial_ts: f64,
    /// Best trial-to-trial rate in trials per second (0 when none)
    pub best_speed: f64,
    /// Whether the last recorded trial was a win
    pub last_was_win: bool,
    /// Message that last pushed the streak to 3
    pub last_triple_msg_id: Option<MessageId>,
    /// Domain expansions activated
    pub domains_used: u32,
    /// Losing streak at the last vent
    #[serde(alias = "last_bestemmia_sfiga")]
    pub last_vent_sfiga: u32,
    /// Unlocked achievements
    pub achievements: BTreeSet<Achievement>,
}

impl Default for PlayerRecord {
    fn default() -> Self {
        PlayerRecord {
            name: String::new(),
            points: 0,
            streak: 0,
            best_streak: 0,
            sfiga: 0,
            best_sfiga: 0,
            total_trials: 0,
            total_wins: 0,
            doubles: 0,
            triples: 0,
            quads: 0,
            quints: 0,
            duel_wins: 0,
            duel_losses: 0,
            elo: DEFAULT_ELO,
            last_trial_ts: 0.0,
            best_speed: 0.0,
            last_was_win: false,
            last_triple_msg_id: None,
            domains_used: 0,
            last_vent_sfiga: 0,
            achievements: BTreeSet::new(),
        }
    }
}

impl PlayerRecord {
    /// Create a record for a new player.
    pub fn new(name: impl Into<String>) -> Self {
        PlayerRecord {
            name: name.into(),
            ..PlayerRecord::default()
        }
    }

    /// Wins over trials, 0 when nothing was rolled yet.
    pub fn win_rate(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            self.total_wins as f64 / self.total_trials as f64
        }
    }

    /// Sum of all combo counters.
    pub fn combo_total(&self) -> u32 {
        self.doubles
            .saturating_add(self.triples)
            .saturating_add(self.quads)
            .saturating_add(self.quints)
    }

    /// Unlock an achievement. Returns true if it was not owned before.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        self.achievements.insert(achievement)
    }

    /// Set the current streak, raising the best streak if exceeded.
    pub fn set_streak(&mut self, streak: u32) {
        self.streak = streak;
        self.best_streak = self.best_streak.max(streak);
    }

    /// Set the current losing streak, raising the best if exceeded.
    pub fn set_sfiga(&mut self, sfiga: u32) {
        self.sfiga = sfiga;
        self.best_sfiga = self.best_sfiga.max(sfiga);
    }

    /// Reinitialise every field except the name.
    pub fn reset(&mut self) {
        let name = std::mem::take(&mut self.name);
        *self = PlayerRecord::new(name);
    }
}

/// All player records, keyed by user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordBook {
    records: BTreeMap<UserId, PlayerRecord>,
}

impl RecordBook {
    /// Create an empty book.
    pub fn new() -> Self {
        RecordBook::default()
    }

    /// Return the record for `id`, creating it with defaults if missing.
    /// The display name is refreshed either way.
    pub fn ensure(&mut self, id: UserId, name: &str) -> &mut PlayerRecord {
        let record = self
            .records
            .entry(id)
            .or_insert_with(|| PlayerRecord::new(name));
        if record.name != name {
            record.name = name.to_string();
        }
        record
    }

    /// Get a record (read-only).
    pub fn get(&self, id: UserId) -> Option<&PlayerRecord> {
        self.records.get(&id)
    }

    /// Get a record for mutation.
    pub fn get_mut(&mut self, id: UserId) -> Option<&mut PlayerRecord> {
        self.records.get_mut(&id)
    }

    /// Get a record or report `NotFound`.
    pub fn require_mut(&mut self, id: UserId) -> Result<&mut PlayerRecord, GameError> {
        self.records.get_mut(&id).ok_or(GameError::NotFound(id))
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, id: UserId, record: PlayerRecord) {
        self.records.insert(id, record);
    }

    /// Whether a record exists.
    pub fn contains(&self, id: UserId) -> bool {
        self.records.contains_key(&id)
    }

    /// Iterate over all records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &PlayerRecord)> {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // === Admin setters ===

    /// Overwrite a player's points.
    pub fn set_points(&mut self, id: UserId, points: i64) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.points = points;
        Ok(record)
    }

    /// Add (or subtract) points, clamping at the `i64` range.
    pub fn add_points(&mut self, id: UserId, delta: i64) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.points = record.points.saturating_add(delta);
        Ok(record)
    }

    /// Overwrite the current streak.
    pub fn set_streak(&mut self, id: UserId, streak: u32) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.set_streak(streak);
        Ok(record)
    }

    /// Overwrite the current losing streak.
    pub fn set_sfiga(&mut self, id: UserId, sfiga: u32) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.set_sfiga(sfiga);
        Ok(record)
    }

    /// Overwrite the rating.
    pub fn set_elo(&mut self, id: UserId, elo: i32) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.elo = elo;
        Ok(record)
    }

    /// Reinitialise a record, keeping its id and name.
    pub fn reset(&mut self, id: UserId) -> Result<&PlayerRecord, GameError> {
        let record = self.require_mut(id)?;
        record.reset();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_record_defaults() {
        let r = PlayerRecord::new("Alice");
        assert_eq!(r.name, "Alice");
        assert_eq!(r.elo, DEFAULT_ELO);
        assert_eq!(r.points, 0);
        assert_eq!(r.last_triple_msg_id, None);
        assert!(r.achievements.is_empty());
        assert_eq!(r.win_rate(), 0.0);
    }

    #[test]
    fn test_ensure_creates_then_refreshes_name() {
        let mut book = RecordBook::new();
        book.ensure(1, "Alice").points = 5;
        let r = book.ensure(1, "Alicia");
        assert_eq!(r.name, "Alicia");
        assert_eq!(r.points, 5);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_setters_maintain_best() {
        let mut book = RecordBook::new();
        book.ensure(1, "Alice");

        book.set_streak(1, 7).unwrap();
        book.set_streak(1, 2).unwrap();
        let r = book.get(1).unwrap();
        assert_eq!(r.streak, 2);
        assert_eq!(r.best_streak, 7);

        book.set_sfiga(1, 12).unwrap();
        assert_eq!(book.get(1).unwrap().best_sfiga, 12);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut book = RecordBook::new();
        assert_eq!(book.set_points(9, 1).unwrap_err(), GameError::NotFound(9));
        assert_eq!(book.add_points(9, 1).unwrap_err(), GameError::NotFound(9));
        assert_eq!(book.reset(9).unwrap_err(), GameError::NotFound(9));
        assert!(book.is_empty());
    }

    #[test]
    fn test_add_points_can_go_negative() {
        let mut book = RecordBook::new();
        book.ensure(1, "Alice");
        book.add_points(1, 3).unwrap();
        assert_eq!(book.add_points(1, -10).unwrap().points, -7);
    }

    #[test]
    fn test_add_points_clamps_at_extremes() {
        let mut book = RecordBook::new();
        book.ensure(1, "Alice");
        book.set_points(1, i64::MAX).unwrap();
        assert_eq!(book.add_points(1, 1).unwrap().points, i64::MAX);
        book.set_points(1, i64::MIN).unwrap();
        assert_eq!(book.add_points(1, -1).unwrap().points, i64::MIN);
    }

    #[test]
    fn test_reset_keeps_name() {
        let mut book = RecordBook::new();
        let r = book.ensure(1, "Alice");
        r.points = 40;
        r.elo = 1100;
        r.unlock(Achievement::FirstBlood);

        let r = book.reset(1).unwrap();
        assert_eq!(r, &PlayerRecord::new("Alice"));
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut r = PlayerRecord::new("Bob");
        assert!(r.unlock(Achievement::Duelist));
        assert!(!r.unlock(Achievement::Duelist));
        assert_eq!(r.achievements.len(), 1);
    }

    #[test]
    fn test_achievement_ids_roundtrip() {
        for a in Achievement::ALL {
            assert_eq!(Achievement::from_id(a.id()), Some(a));
            let json = serde_json::to_string(&a).unwrap();
            assert_eq!(json, format!("\"{}\"", a.id()));
        }
        assert_eq!(Achievement::from_id("nope"), None);
        assert!(serde_json::from_str::<Achievement>("\"nope\"").is_err());
        let back: Achievement = serde_json::from_str("\"streak_10\"").unwrap();
        assert_eq!(back, Achievement::Streak10);
    }

    proptest! {
        #[test]
        fn prop_record_book_json_roundtrip(
            speed in any::<f64>().prop_filter("finite", |v| v.is_finite()),
            ts in 0.0f64..4_000_000_000.0,
            marker in proptest::option::of(any::<i64>()),
        ) {
            let mut book = RecordBook::new();
            let r = book.ensure(10, "Alice");
            r.best_speed = speed;
            r.last_trial_ts = ts;
            r.last_triple_msg_id = marker;
            r.unlock(Achievement::Triple);
            book.ensure(-3, "Bob").elo = 984;

            let json = serde_json::to_string(&book).unwrap();
            let back: RecordBook = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, book);
        }
    }

    #[test]
    fn test_legacy_field_names_accepted() {
        let json = r#"{"name":"Old","total_slots":9,"double":2,"last_slot_ts":5.0}"#;
        let r: PlayerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.total_trials, 9);
        assert_eq!(r.doubles, 2);
        assert_eq!(r.last_trial_ts, 5.0);
        assert_eq!(r.elo, DEFAULT_ELO);
    }

    #[test]
    fn test_combo_total() {
        let mut r = PlayerRecord::new("C");
        r.doubles = 3;
        r.triples = 2;
        r.quads = 1;
        assert_eq!(r.combo_total(), 6);
    }
}
