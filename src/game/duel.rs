//! Duel coordinator
//!
//! Per-chat state machine: challenge → acceptance → active duel → resolved.
//! Sessions and pending challenges live only in memory and are lost on
//! restart.

use super::{ChatId, UserId};
use crate::error::GameError;
use crate::stats::elo::{EloDelta, EloUpdater};
use crate::stats::{Achievement, RecordBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// How duel rounds are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelMode {
    /// Players take turns; every resolved trial passes the turn
    #[default]
    Alternating,
    /// No acceptance step, no turns; the first participant to reach the
    /// target wins
    Race,
}

/// One side of a duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duelist {
    pub id: UserId,
    pub name: String,
    /// Rounds won in this duel
    pub wins: u32,
}

impl Duelist {
    fn new(id: UserId, name: &str) -> Self {
        Duelist {
            id,
            name: name.to_string(),
            wins: 0,
        }
    }
}

/// An active duel in one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelSession {
    /// Player one is whoever moves first
    pub players: [Duelist; 2],
    /// Who must roll next (ignored in race mode)
    pub current_turn: UserId,
}

impl DuelSession {
    fn new(first: (UserId, &str), second: (UserId, &str)) -> Self {
        DuelSession {
            players: [Duelist::new(first.0, first.1), Duelist::new(second.0, second.1)],
            current_turn: first.0,
        }
    }

    fn index_of(&self, user: UserId) -> Option<usize> {
        self.players.iter().position(|p| p.id == user)
    }

    /// Name of the player on turn.
    pub fn on_turn_name(&self) -> &str {
        self.players
            .iter()
            .find(|p| p.id == self.current_turn)
            .map(|p| p.name.as_str())
            .unwrap_or_default()
    }
}

/// A challenge waiting for the target's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChallenge {
    pub challenger: UserId,
    pub challenger_name: String,
    pub target: UserId,
    pub target_name: String,
}

/// A finished duel. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelHistoryEntry {
    pub p1: String,
    pub p2: String,
    pub score1: u32,
    pub score2: u32,
    pub winner: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a challenge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Waiting for the target to accept
    Pending(PendingChallenge),
    /// Duel started right away (counter-challenge or race mode)
    Started(DuelSession),
}

/// Details of a completed duel.
#[derive(Debug, Clone, PartialEq)]
pub struct DuelFinish {
    pub entry: DuelHistoryEntry,
    pub winner_id: UserId,
    pub loser_id: UserId,
    pub elo: EloDelta,
    /// Winner unlocked the duelist achievement with this duel
    pub first_duel_win: bool,
}

/// How a trial affected the chat's duel.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// No duel running in the chat
    NoDuel,
    /// Trial came from someone outside the duel
    NotParticipant,
    /// Participant rolled out of turn; nothing changed
    NotYourTurn { on_turn: String },
    /// Round resolved, duel continues
    Round {
        won: bool,
        /// (this player's wins, opponent's wins)
        score: (u32, u32),
        /// Who rolls next (alternating mode only)
        next_turn: Option<String>,
    },
    /// Round resolved and the duel is over
    Finished(DuelFinish),
}

/// Every duel and pending challenge, keyed by chat.
#[derive(Debug, Clone)]
pub struct DuelBoard {
    mode: DuelMode,
    target_wins: u32,
    elo: EloUpdater,
    sessions: HashMap<ChatId, DuelSession>,
    pending: HashMap<ChatId, PendingChallenge>,
}

impl DuelBoard {
    pub fn new(mode: DuelMode, target_wins: u32, elo: EloUpdater) -> Self {
        DuelBoard {
            mode,
            target_wins: target_wins.max(1),
            elo,
            sessions: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every session and pending challenge.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.pending.clear();
    }

    /// Challenge `target` to a duel in `chat`.
    ///
    /// A challenger re-issuing a challenge replaces their own pending one.
    /// Challenging someone who is already waiting on you counts as
    /// accepting their challenge.
    pub fn challenge(
        &mut self,
        chat: ChatId,
        challenger: (UserId, &str),
        target: (UserId, &str),
    ) -> Result<ChallengeOutcome, GameError> {
        if challenger.0 == target.0 {
            return Err(GameError::SelfChallenge);
        }
        if self.sessions.contains_key(&chat) {
            return Err(GameError::DuelInProgress);
        }

        if self.mode == DuelMode::Race {
            let session = DuelSession::new(challenger, target);
            self.sessions.insert(chat, session.clone());
            info!(chat, p1 = challenger.0, p2 = target.0, "race duel started");
            return Ok(ChallengeOutcome::Started(session));
        }

        if let Some(existing) = self.pending.get(&chat) {
            if existing.challenger == target.0 && existing.target == challenger.0 {
                return self.accept_challenge(chat, challenger.0).map(ChallengeOutcome::Started);
            }
            if existing.challenger != challenger.0 {
                return Err(GameError::ChallengePending);
            }
        }

        let pending = PendingChallenge {
            challenger: challenger.0,
            challenger_name: challenger.1.to_string(),
            target: target.0,
            target_name: target.1.to_string(),
        };
        self.pending.insert(chat, pending.clone());
        Ok(ChallengeOutcome::Pending(pending))
    }

    /// Accept the pending challenge addressed to `accepter`.
    ///
    /// The accepter takes the first turn.
    pub fn accept_challenge(&mut self, chat: ChatId, accepter: UserId) -> Result<DuelSession, GameError> {
        if self.sessions.contains_key(&chat) {
            return Err(GameError::DuelInProgress);
        }
        match self.pending.get(&chat) {
            Some(p) if p.target == accepter => {}
            _ => return Err(GameError::NoPendingChallenge),
        }
        let Some(p) = self.pending.remove(&chat) else {
            return Err(GameError::NoPendingChallenge);
        };

        let session = DuelSession::new(
            (p.target, &p.target_name),
            (p.challenger, &p.challenger_name),
        );
        self.sessions.insert(chat, session.clone());
        info!(chat, p1 = p.target, p2 = p.challenger, "duel accepted");
        Ok(session)
    }

    /// Feed a resolved trial into the chat's duel.
    ///
    /// Finishing a duel updates both players' duel counters and ratings in
    /// `book` and returns the history entry for the caller to append.
    pub fn resolve_turn(
        &mut self,
        chat: ChatId,
        user: UserId,
        won: bool,
        book: &mut RecordBook,
        now: DateTime<Utc>,
    ) -> TurnOutcome {
        let Some(session) = self.sessions.get_mut(&chat) else {
            return TurnOutcome::NoDuel;
        };
        let Some(me) = session.index_of(user) else {
            return TurnOutcome::NotParticipant;
        };
        let other = 1 - me;

        if self.mode == DuelMode::Alternating && session.current_turn != user {
            return TurnOutcome::NotYourTurn {
                on_turn: session.on_turn_name().to_string(),
            };
        }

        if won {
            session.players[me].wins += 1;
        }
        if self.mode == DuelMode::Alternating {
            session.current_turn = session.players[other].id;
        }

        let score = (session.players[me].wins, session.players[other].wins);
        if score.0 < self.target_wins {
            let next_turn = (self.mode == DuelMode::Alternating)
                .then(|| session.players[other].name.clone());
            return TurnOutcome::Round { won, score, next_turn };
        }

        match self.sessions.remove(&chat) {
            Some(finished) => TurnOutcome::Finished(self.finalize(chat, finished, book, now)),
            None => TurnOutcome::NoDuel,
        }
    }

    fn finalize(
        &self,
        chat: ChatId,
        session: DuelSession,
        book: &mut RecordBook,
        now: DateTime<Utc>,
    ) -> DuelFinish {
        let [p1, p2] = session.players;
        let (winner, loser) = if p1.wins > p2.wins { (&p1, &p2) } else { (&p2, &p1) };

        let w = book.ensure(winner.id, &winner.name);
        w.duel_wins = w.duel_wins.saturating_add(1);
        let l = book.ensure(loser.id, &loser.name);
        l.duel_losses = l.duel_losses.saturating_add(1);

        // Both records exist after ensure
        let elo = self
            .elo
            .update(winner.id, loser.id, book)
            .unwrap_or(EloDelta { winner: 0, loser: 0 });

        let first_duel_win = book.ensure(winner.id, &winner.name).unlock(Achievement::Duelist);

        info!(
            chat,
            winner = winner.id,
            loser = loser.id,
            score1 = p1.wins,
            score2 = p2.wins,
            "duel finished"
        );

        DuelFinish {
            entry: DuelHistoryEntry {
                p1: p1.name.clone(),
                p2: p2.name.clone(),
                score1: p1.wins,
                score2: p2.wins,
                winner: winner.name.clone(),
                timestamp: now,
            },
            winner_id: winner.id,
            loser_id: loser.id,
            elo,
            first_duel_win,
        }
    }
}

impl Default for DuelBoard {
    fn default() -> Self {
        DuelBoard::new(DuelMode::default(), 3, EloUpdater::default())
    }
}
