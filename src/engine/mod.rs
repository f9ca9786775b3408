//! Roll orchestrator and command surface
//!
//! This module provides:
//! - `Engine`, which owns the store, the session context and the RNG and
//!   runs every trial through classification, streaks, duels and the
//!   expansion gate
//! - Clock and notifier seams (`clock`, `notify`)
//! - Per-user trial serialization (`locks`)
//! - Admin commands (`admin`) and request dispatch (`dispatch`)
//!
//! Each trial mutates state in a single critical section with no await
//! inside it. The only suspension point is the reveal delay, which happens
//! before that section, so other chats keep moving while one trial waits.

pub mod admin;
pub mod clock;
pub mod dispatch;
pub mod locks;
pub mod messages;
pub mod notify;
pub mod session;

use crate::config::EngineConfig;
use crate::error::GameError;
use crate::game::duel::{ChallengeOutcome, DuelHistoryEntry, DuelSession, TurnOutcome};
use crate::game::streak::{self, MilestoneRule, TrialEvent};
use crate::game::{ChatId, Classifier, MessageId, RollValue, UserId};
use crate::stats::leaderboard::{self, LeaderboardKind, LeaderboardOptions, LeaderboardRow};
use crate::stats::{Achievement, PlayerRecord, RecordBook};
use crate::storage::StateStore;
use clock::{Clock, SystemClock};
use locks::KeyedLocks;
use notify::Notifier;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use session::SessionContext;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A chat user as the transport identifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
}

impl UserRef {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        UserRef {
            id,
            name: name.into(),
        }
    }
}

fn genuine_by_default() -> bool {
    true
}

/// Trust flags the transport attaches to every trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustFlags {
    /// Message was forwarded from elsewhere
    pub forwarded: bool,
    /// Message was edited after sending
    pub edited: bool,
    /// Message was sent through another bot
    pub via_bot: bool,
    /// Sender is itself a bot
    pub from_bot: bool,
    /// Message carries a real slot payload
    #[serde(default = "genuine_by_default")]
    pub genuine: bool,
}

impl Default for TrustFlags {
    fn default() -> Self {
        TrustFlags {
            forwarded: false,
            edited: false,
            via_bot: false,
            from_bot: false,
            genuine: true,
        }
    }
}

/// One slot roll as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRequest {
    pub chat: ChatId,
    pub user: UserRef,
    /// Sequence id of the message carrying the roll
    pub message_id: MessageId,
    pub value: RollValue,
    #[serde(default)]
    pub flags: TrustFlags,
}

/// Why a trial was refused before touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("⛔ Slot tracking is temporarily disabled by the admin.")]
    TrackingBlocked,
    #[error("❌ You cannot forward a slot. Nice try.")]
    Forwarded,
    #[error("❌ An edited slot? That's not how it works.")]
    Edited,
    #[error("❌ You cannot roll through another bot.")]
    ViaBot,
    #[error("❌ That is not a real slot roll.")]
    NotGenuine,
}

/// What happened to a trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// Dropped without a word (bot senders, non-admin in debug mode)
    Ignored,
    /// Refused with a notice; no state touched
    Rejected(Rejection),
    /// A loss erased by the domain expansion; nothing recorded
    Suppressed,
    /// Trial applied and persisted
    Recorded {
        won: bool,
        jackpot: bool,
        events: Vec<TrialEvent>,
        duel: TurnOutcome,
    },
}

/// Mutable engine state, guarded by one lock.
struct EngineState {
    store: Box<dyn StateStore>,
    session: SessionContext,
    rng: StdRng,
}

/// The game engine.
pub struct Engine {
    config: EngineConfig,
    classifier: Classifier,
    state: Mutex<EngineState>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    user_locks: KeyedLocks<UserId>,
}

impl Engine {
    /// Create an engine on the system clock with an OS-seeded RNG.
    pub fn new(config: EngineConfig, store: Box<dyn StateStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_parts(
            config,
            store,
            notifier,
            Arc::new(SystemClock),
            StdRng::from_rng(&mut rand::rng()),
        )
    }

    /// Create an engine with explicit clock and RNG.
    pub fn with_parts(
        config: EngineConfig,
        store: Box<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let state = EngineState {
            store,
            session: SessionContext::from_config(&config),
            rng,
        };
        Engine {
            classifier: Classifier::from_config(&config),
            config,
            state: Mutex::new(state),
            clock,
            notifier,
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist_players(store: &mut dyn StateStore, book: &RecordBook) {
        if let Err(e) = store.save_players(book) {
            warn!(error = %e, "failed to save player records");
        }
    }

    fn milestones(&self) -> MilestoneRule {
        MilestoneRule {
            start: self.config.sfiga_milestone_start,
            step: self.config.sfiga_milestone_step,
        }
    }

    // === Trials ===

    /// Run one trial end to end.
    ///
    /// Trials from the same user are processed one at a time in arrival
    /// order.
    pub async fn process_trial(&self, trial: TrialRequest) -> TrialOutcome {
        if let Some(outcome) = self.screen(&trial) {
            return outcome;
        }

        let _turn = self.user_locks.lock(trial.user.id).await;

        // Captured before the reveal delay; becomes the speed reference
        let captured = {
            let mut state = self.state();
            let now = self.clock.epoch_secs();
            if state.session.expansions.expire_if_due(trial.chat, now) {
                self.notifier.notify(trial.chat, messages::EXPANSION_ENDED);
            }
            now
        };

        let delay = self.config.reveal_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.record_trial(&trial, captured)
    }

    /// Entry checks. `Some` means the trial stops here.
    fn screen(&self, trial: &TrialRequest) -> Option<TrialOutcome> {
        let state = self.state();
        let debug_mode = state.session.debug_mode;
        let blocked = state.session.tracking_blocked;
        drop(state);

        if trial.flags.from_bot {
            return Some(TrialOutcome::Ignored);
        }
        if !blocked && debug_mode && trial.user.id != self.config.admin_id {
            return Some(TrialOutcome::Ignored);
        }

        let rejection = if blocked {
            Some(Rejection::TrackingBlocked)
        } else if debug_mode {
            None
        } else if trial.flags.forwarded {
            Some(Rejection::Forwarded)
        } else if trial.flags.edited {
            Some(Rejection::Edited)
        } else if trial.flags.via_bot {
            Some(Rejection::ViaBot)
        } else if !trial.flags.genuine
            || trial.value < self.config.roll_min
            || trial.value > self.config.roll_max
        {
            Some(Rejection::NotGenuine)
        } else {
            None
        };

        rejection.map(|r| {
            debug!(chat = trial.chat, user = trial.user.id, reason = ?r, "trial rejected");
            self.notifier.notify(trial.chat, &r.to_string());
            TrialOutcome::Rejected(r)
        })
    }

    /// The critical section: everything from the re-read to the save.
    fn record_trial(&self, trial: &TrialRequest, captured: f64) -> TrialOutcome {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = self.clock.epoch_secs();
        let (chat, user) = (trial.chat, trial.user.id);

        let mut directory = state.store.load_directory();
        if directory.get(&user) != Some(&trial.user.name) {
            directory.insert(user, trial.user.name.clone());
            if let Err(e) = state.store.save_directory(&directory) {
                warn!(error = %e, "failed to save user directory");
            }
        }

        let mut book = state.store.load_players();
        let classification = self.classifier.classify(trial.value);
        let expansion_active = state.session.expansions.is_active(chat, now);
        let record = book.ensure(user, &trial.user.name);

        let draw: f64 = state.rng.random();
        if state.session.expansions.should_suppress(
            chat,
            record.last_was_win,
            classification.won,
            now,
            draw,
            self.config.suppression_probability,
        ) {
            info!(chat, user, "loss erased by domain expansion");
            self.notifier.retract(chat, trial.message_id);
            self.notifier.notify(chat, messages::LOSS_ERASED);
            return TrialOutcome::Suppressed;
        }

        let speed = streak::apply_speed(record, captured);
        let mut events = if classification.won {
            streak::apply_win(record, classification, trial.message_id, expansion_active)
        } else {
            streak::apply_loss(record, self.milestones())
        };
        events.extend(speed);

        let duel = state
            .session
            .duels
            .resolve_turn(chat, user, classification.won, &mut book, self.clock.now());

        if let TurnOutcome::Finished(finish) = &duel {
            let mut history = state.store.load_duel_history();
            history.push(finish.entry.clone());
            if let Err(e) = state.store.save_duel_history(&history) {
                warn!(error = %e, "failed to save duel history");
            }
        }

        Self::persist_players(state.store.as_mut(), &book);
        drop(guard);

        if let Some(text) = messages::trial_report(&trial.user.name, &events, &duel) {
            self.notifier.notify(chat, &text);
        }

        TrialOutcome::Recorded {
            won: classification.won,
            jackpot: classification.jackpot,
            events,
            duel,
        }
    }

    // === Duels ===

    /// Challenge another user in `chat`.
    pub fn challenge(
        &self,
        chat: ChatId,
        challenger: &UserRef,
        target: &UserRef,
    ) -> Result<ChallengeOutcome, GameError> {
        self.state().session.duels.challenge(
            chat,
            (challenger.id, &challenger.name),
            (target.id, &target.name),
        )
    }

    /// Accept the challenge addressed to `user` in `chat`.
    pub fn accept(&self, chat: ChatId, user: UserId) -> Result<DuelSession, GameError> {
        self.state().session.duels.accept_challenge(chat, user)
    }

    // === Domain expansion ===

    /// Activate a domain expansion. Returns the expiry (epoch seconds).
    pub fn activate_expansion(
        &self,
        chat: ChatId,
        user: UserId,
        message_seq: MessageId,
    ) -> Result<f64, GameError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = self.clock.epoch_secs();

        let mut book = state.store.load_players();
        let record = book.get_mut(user).ok_or(GameError::NoTripleMarker)?;
        let until = state.session.expansions.activate(chat, record, message_seq, now)?;

        Self::persist_players(state.store.as_mut(), &book);
        Ok(until)
    }

    // === Vent ===

    /// Let a player vent after a long enough losing streak.
    pub fn vent(&self, user: UserId, name: &str) -> Result<PlayerRecord, GameError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let threshold = i64::from(self.config.vent_threshold);

        let mut book = state.store.load_players();
        let record = book.ensure(user, name);
        let sfiga = i64::from(record.sfiga);
        let baseline = i64::from(record.last_vent_sfiga);

        if sfiga < threshold {
            return Err(GameError::VentNotEarned {
                needed: (threshold - sfiga) as u32,
            });
        }
        if sfiga - baseline < threshold {
            return Err(GameError::VentNotEarned {
                needed: (baseline + threshold - sfiga) as u32,
            });
        }

        record.last_vent_sfiga = record.sfiga;
        record.unlock(Achievement::Bestemmia);
        let snapshot = record.clone();
        Self::persist_players(state.store.as_mut(), &book);
        Ok(snapshot)
    }

    // === Queries ===

    /// A player's record, created with defaults on first query.
    pub fn player_stats(&self, user: UserId, name: &str) -> PlayerRecord {
        let mut guard = self.state();
        let state = &mut *guard;
        let mut book = state.store.load_players();
        let existed = book.contains(user);
        let snapshot = book.ensure(user, name).clone();
        if !existed {
            Self::persist_players(state.store.as_mut(), &book);
        }
        snapshot
    }

    /// Ranked rows for one leaderboard.
    pub fn leaderboard(&self, kind: LeaderboardKind) -> Vec<LeaderboardRow> {
        let book = self.state().store.load_players();
        leaderboard::build(
            &book,
            kind,
            LeaderboardOptions {
                size: self.config.leaderboard_size,
                winrate_min_trials: self.config.winrate_min_trials,
            },
        )
    }

    /// The latest duels, newest first.
    pub fn duel_history(&self, limit: Option<usize>) -> Vec<DuelHistoryEntry> {
        let history = self.state().store.load_duel_history();
        history
            .into_iter()
            .rev()
            .take(limit.unwrap_or(self.config.history_limit))
            .collect()
    }
}
