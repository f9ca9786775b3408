//! Admin commands
//!
//! Only the configured admin id may run these. Record edits go through the
//! `RecordBook` setters so the best-of counters stay consistent.

use super::{Engine, EngineState};
use crate::error::GameError;
use crate::game::duel::DuelHistoryEntry;
use crate::game::UserId;
use crate::stats::{PlayerRecord, RecordBook};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// An admin override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminCommand {
    SetPoints { user: UserId, value: i64 },
    AddPoints { user: UserId, delta: i64 },
    SetStreak { user: UserId, value: u32 },
    SetSfiga { user: UserId, value: u32 },
    SetElo { user: UserId, value: i32 },
    /// Reinitialise a record, keeping id and name
    ResetUser { user: UserId },
    BlockTracking,
    UnblockTracking,
    ToggleDebug,
    /// Drop every duel, challenge and expansion
    ClearEphemeral,
    /// Append a duel to the history by hand
    AddDuel {
        p1: String,
        p2: String,
        score1: u32,
        score2: u32,
        winner: String,
    },
    Summary,
}

/// Counts describing the whole engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub records: usize,
    pub history: usize,
    pub directory: usize,
    pub active_duels: usize,
    pub pending_challenges: usize,
    pub active_expansions: usize,
    pub tracking_blocked: bool,
    pub debug_mode: bool,
}

/// Result of an admin command.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    Record { user: UserId, record: PlayerRecord },
    TrackingBlocked(bool),
    DebugMode(bool),
    Cleared,
    DuelAdded(DuelHistoryEntry),
    Summary(StateSummary),
}

impl AdminOutcome {
    /// Chat text confirming the command.
    pub fn render(&self) -> String {
        match self {
            AdminOutcome::Record { user, record } => format!(
                "✅ {} ({}): {} pts, streak {} (best {}), sfiga {} (worst {}), ELO {}",
                record.name,
                user,
                record.points,
                record.streak,
                record.best_streak,
                record.sfiga,
                record.best_sfiga,
                record.elo
            ),
            AdminOutcome::TrackingBlocked(true) => "⛔ Slot tracking blocked.".to_string(),
            AdminOutcome::TrackingBlocked(false) => "✅ Slot tracking resumed.".to_string(),
            AdminOutcome::DebugMode(on) => {
                format!("🛠 Debug mode {}.", if *on { "on" } else { "off" })
            }
            AdminOutcome::Cleared => "🧹 Duels, challenges and expansions cleared.".to_string(),
            AdminOutcome::DuelAdded(e) => format!(
                "✅ Duel added: {} {}-{} {} → {}",
                e.p1, e.score1, e.score2, e.p2, e.winner
            ),
            AdminOutcome::Summary(s) => format!(
                "📋 State\nRecords: {}\nDuel history: {}\nDirectory: {}\n\
                 Active duels: {}\nPending challenges: {}\nActive expansions: {}\n\
                 Tracking blocked: {}\nDebug mode: {}",
                s.records,
                s.history,
                s.directory,
                s.active_duels,
                s.pending_challenges,
                s.active_expansions,
                s.tracking_blocked,
                s.debug_mode
            ),
        }
    }
}

impl Engine {
    /// Run an admin command on behalf of `caller`.
    pub fn admin(&self, caller: UserId, command: AdminCommand) -> Result<AdminOutcome, GameError> {
        if caller != self.config.admin_id {
            return Err(GameError::PermissionDenied);
        }
        info!(caller, ?command, "admin command");

        let mut guard = self.state();
        let state = &mut *guard;

        match command {
            AdminCommand::SetPoints { user, value } => {
                Self::edit_record(state, user, |book| book.set_points(user, value))
            }
            AdminCommand::AddPoints { user, delta } => {
                Self::edit_record(state, user, |book| book.add_points(user, delta))
            }
            AdminCommand::SetStreak { user, value } => {
                Self::edit_record(state, user, |book| book.set_streak(user, value))
            }
            AdminCommand::SetSfiga { user, value } => {
                Self::edit_record(state, user, |book| book.set_sfiga(user, value))
            }
            AdminCommand::SetElo { user, value } => {
                Self::edit_record(state, user, |book| book.set_elo(user, value))
            }
            AdminCommand::ResetUser { user } => Self::edit_record(state, user, |book| book.reset(user)),
            AdminCommand::BlockTracking => {
                state.session.tracking_blocked = true;
                Ok(AdminOutcome::TrackingBlocked(true))
            }
            AdminCommand::UnblockTracking => {
                state.session.tracking_blocked = false;
                Ok(AdminOutcome::TrackingBlocked(false))
            }
            AdminCommand::ToggleDebug => {
                state.session.debug_mode = !state.session.debug_mode;
                Ok(AdminOutcome::DebugMode(state.session.debug_mode))
            }
            AdminCommand::ClearEphemeral => {
                state.session.clear_ephemeral();
                Ok(AdminOutcome::Cleared)
            }
            AdminCommand::AddDuel {
                p1,
                p2,
                score1,
                score2,
                winner,
            } => {
                let entry = DuelHistoryEntry {
                    p1,
                    p2,
                    score1,
                    score2,
                    winner,
                    timestamp: self.clock.now(),
                };
                let mut history = state.store.load_duel_history();
                history.push(entry.clone());
                if let Err(e) = state.store.save_duel_history(&history) {
                    warn!(error = %e, "failed to save duel history");
                }
                Ok(AdminOutcome::DuelAdded(entry))
            }
            AdminCommand::Summary => Ok(AdminOutcome::Summary(StateSummary {
                records: state.store.load_players().len(),
                history: state.store.load_duel_history().len(),
                directory: state.store.load_directory().len(),
                active_duels: state.session.duels.active_count(),
                pending_challenges: state.session.duels.pending_count(),
                active_expansions: state.session.expansions.active_count(),
                tracking_blocked: state.session.tracking_blocked,
                debug_mode: state.session.debug_mode,
            })),
        }
    }

    /// Load, edit and save one record.
    fn edit_record(
        state: &mut EngineState,
        user: UserId,
        edit: impl FnOnce(&mut RecordBook) -> Result<&PlayerRecord, GameError>,
    ) -> Result<AdminOutcome, GameError> {
        let mut book = state.store.load_players();
        let record = edit(&mut book)?.clone();
        Self::persist_players(state.store.as_mut(), &book);
        Ok(AdminOutcome::Record { user, record })
    }
}
