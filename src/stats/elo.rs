//! Two-player ELO rating updates
//!
//! - Expected score: E_A = 1 / (1 + 10^((R_B - R_A)/400))
//! - New rating: round(R + K * (actual - expected)), actual 1 for the winner, 0 for the loser
//!
//! Both new ratings are computed from the pre-update pair before either is
//! written. Ratings have no floor.

use super::RecordBook;
use crate::error::GameError;
use crate::game::UserId;

/// Default K factor for rating updates
pub const DEFAULT_K: f64 = 32.0;

/// Rating changes applied by one duel result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EloDelta {
    /// Points gained by the winner
    pub winner: i32,
    /// Points gained (usually negative) by the loser
    pub loser: i32,
}

/// Applies duel results to player ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdater {
    k_factor: f64,
}

impl EloUpdater {
    /// Create an updater with the default K factor.
    pub fn new() -> Self {
        EloUpdater { k_factor: DEFAULT_K }
    }

    /// Create with custom K factor
    pub fn with_k_factor(k_factor: f64) -> Self {
        EloUpdater { k_factor }
    }

    /// Calculate expected score for player A vs player B
    pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
        1.0 / (1.0 + 10.0_f64.powf((f64::from(rating_b) - f64::from(rating_a)) / 400.0))
    }

    /// New (winner, loser) ratings for a decided game.
    pub fn ratings_after(&self, winner: i32, loser: i32) -> (i32, i32) {
        let expected_winner = Self::expected_score(winner, loser);
        let expected_loser = Self::expected_score(loser, winner);

        let new_winner = (f64::from(winner) + self.k_factor * (1.0 - expected_winner)).round();
        let new_loser = (f64::from(loser) + self.k_factor * (0.0 - expected_loser)).round();

        // `as` clamps to the i32 range
        (new_winner as i32, new_loser as i32)
    }

    /// Apply a duel result to both records.
    ///
    /// Fails with `NotFound` without touching either record if one is missing.
    pub fn update(
        &self,
        winner_id: UserId,
        loser_id: UserId,
        book: &mut RecordBook,
    ) -> Result<EloDelta, GameError> {
        debug_assert_ne!(winner_id, loser_id);

        let winner_before = book.get(winner_id).ok_or(GameError::NotFound(winner_id))?.elo;
        let loser_before = book.get(loser_id).ok_or(GameError::NotFound(loser_id))?.elo;

        let (winner_after, loser_after) = self.ratings_after(winner_before, loser_before);

        book.require_mut(winner_id)?.elo = winner_after;
        book.require_mut(loser_id)?.elo = loser_after;

        Ok(EloDelta {
            winner: winner_after.saturating_sub(winner_before),
            loser: loser_after.saturating_sub(loser_before),
        })
    }
}

impl Default for EloUpdater {
    fn default() -> Self {
        Self::new()
    }
}
