//! Runtime session context
//!
//! Everything that lives only as long as the process: duels, pending
//! challenges, expansion timers and the admin flags. A restart starts from
//! an empty context, so in-progress duels are abandoned.

use crate::config::EngineConfig;
use crate::game::duel::DuelBoard;
use crate::game::expansion::ExpansionGate;
use crate::stats::elo::EloUpdater;
use std::time::Duration;

/// Ephemeral per-process state threaded through the engine.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub duels: DuelBoard,
    pub expansions: ExpansionGate,
    /// Trial tracking suspended by the admin
    pub tracking_blocked: bool,
    /// Only the admin may roll; authenticity checks are skipped
    pub debug_mode: bool,
}

impl SessionContext {
    pub fn from_config(config: &EngineConfig) -> Self {
        SessionContext {
            duels: DuelBoard::new(
                config.duel_mode,
                config.duel_target_wins,
                EloUpdater::with_k_factor(config.elo_k_factor),
            ),
            expansions: ExpansionGate::new(
                Duration::from_secs(config.expansion_duration_secs),
                config.expansion_message_window,
            ),
            tracking_blocked: false,
            debug_mode: false,
        }
    }

    /// Drop every duel, challenge and expansion. Flags are kept.
    pub fn clear_ephemeral(&mut self) {
        self.duels.clear();
        self.expansions.clear();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        SessionContext::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PlayerRecord;

    #[test]
    fn test_clear_keeps_flags() {
        let mut ctx = SessionContext::default();
        ctx.tracking_blocked = true;
        ctx.duels.challenge(1, (1, "A"), (2, "B")).unwrap();
        let mut r = PlayerRecord::new("A");
        r.last_triple_msg_id = Some(1);
        ctx.expansions.activate(1, &mut r, 1, 0.0).unwrap();

        ctx.clear_ephemeral();

        assert_eq!(ctx.duels.pending_count(), 0);
        assert_eq!(ctx.expansions.active_count(), 0);
        assert!(ctx.tracking_blocked);
    }

    #[test]
    fn test_contexts_are_isolated() {
        let mut a = SessionContext::default();
        let b = SessionContext::default();
        a.duels.challenge(1, (1, "A"), (2, "B")).unwrap();
        assert_eq!(b.duels.pending_count(), 0);
    }
}
