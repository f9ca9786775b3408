//! Game logic: trial classification, streaks, duels, domain expansion

pub mod duel;
pub mod expansion;
pub mod streak;

use crate::config::EngineConfig;
use std::collections::BTreeSet;

/// Opaque user identifier handed over by the chat transport.
pub type UserId = i64;
/// Chat/channel identifier.
pub type ChatId = i64;
/// Per-chat message sequence number.
pub type MessageId = i64;
/// Raw value shown by the slot.
pub type RollValue = u32;

/// Winning values of the stock 64-face slot.
pub const DEFAULT_WINNING_VALUES: [RollValue; 4] = [1, 22, 43, 64];

/// The stock jackpot (three sevens).
pub const DEFAULT_JACKPOT: RollValue = 64;

/// Outcome of classifying a single roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Whether the roll is a winning value
    pub won: bool,
    /// Whether the roll is the designated jackpot
    pub jackpot: bool,
}

/// Maps raw roll values to win/loss.
///
/// Pure and deterministic; the only entropy is in the roll itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    winning: BTreeSet<RollValue>,
    jackpot: RollValue,
}

impl Classifier {
    /// Create a classifier for a winning set and its jackpot.
    pub fn new(winning: impl IntoIterator<Item = RollValue>, jackpot: RollValue) -> Self {
        Self {
            winning: winning.into_iter().collect(),
            jackpot,
        }
    }

    /// Build the classifier described by the engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.winning_values.iter().copied(), config.jackpot_value)
    }

    /// Classify a roll value.
    pub fn classify(&self, value: RollValue) -> Classification {
        let won = self.winning.contains(&value);
        Classification {
            won,
            jackpot: won && value == self.jackpot,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_WINNING_VALUES, DEFAULT_JACKPOT)
    }
}
