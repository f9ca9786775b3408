//! Domain expansion gate
//!
//! A timed per-chat buff. Reaching a streak of exactly 3 leaves a marker on
//! the player's record; activating within the message window starts the
//! expansion. While it runs, a loss following a win may be erased.

use super::{ChatId, MessageId};
use crate::error::GameError;
use crate::stats::PlayerRecord;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Default expansion length (4 minutes 11 seconds)
pub const DEFAULT_DURATION: Duration = Duration::from_secs(251);

/// Default number of messages allowed between the triple and activation
pub const DEFAULT_WINDOW: i64 = 10;

/// Expansion expiry per chat.
#[derive(Debug, Clone)]
pub struct ExpansionGate {
    duration: Duration,
    window: i64,
    /// Epoch seconds at which each chat's expansion ends
    expiries: HashMap<ChatId, f64>,
}

impl ExpansionGate {
    pub fn new(duration: Duration, window: i64) -> Self {
        ExpansionGate {
            duration,
            window,
            expiries: HashMap::new(),
        }
    }

    /// Whether the chat has an expansion running at `now`.
    pub fn is_active(&self, chat: ChatId, now: f64) -> bool {
        self.expiries.get(&chat).is_some_and(|until| *until > now)
    }

    /// Activate an expansion for `record`'s owner.
    ///
    /// `message_seq` is the sequence id of the activation request. Only the
    /// upper end of the window is checked, since the marker may come from
    /// another chat's id sequence. On success the expiry is returned, the record's counter is bumped and
    /// its marker is cleared. On failure nothing changes.
    pub fn activate(
        &mut self,
        chat: ChatId,
        record: &mut PlayerRecord,
        message_seq: MessageId,
        now: f64,
    ) -> Result<f64, GameError> {
        let marker = record.last_triple_msg_id.ok_or(GameError::NoTripleMarker)?;
        if message_seq.saturating_sub(marker) > self.window {
            return Err(GameError::WindowExpired);
        }
        if self.is_active(chat, now) {
            return Err(GameError::ExpansionActive);
        }

        let until = now + self.duration.as_secs_f64();
        self.expiries.insert(chat, until);
        record.domains_used = record.domains_used.saturating_add(1);
        record.last_triple_msg_id = None;

        info!(chat, player = %record.name, until, "domain expansion activated");
        Ok(until)
    }

    /// Clear the chat's expansion if it has run out.
    ///
    /// Returns true exactly once per expiry, when the end is first noticed.
    pub fn expire_if_due(&mut self, chat: ChatId, now: f64) -> bool {
        match self.expiries.get(&chat) {
            Some(until) if *until < now => {
                self.expiries.remove(&chat);
                info!(chat, "domain expansion ended");
                true
            }
            _ => false,
        }
    }

    /// Whether a trial should be erased instead of recorded.
    ///
    /// Only a loss right after a win, inside an active expansion, with
    /// `draw` (uniform in [0, 1)) below `probability` qualifies.
    pub fn should_suppress(
        &self,
        chat: ChatId,
        last_was_win: bool,
        won: bool,
        now: f64,
        draw: f64,
        probability: f64,
    ) -> bool {
        self.is_active(chat, now) && last_was_win && !won && draw < probability
    }

    /// Number of chats with a recorded expiry.
    pub fn active_count(&self) -> usize {
        self.expiries.len()
    }

    /// Drop every expansion.
    pub fn clear(&mut self) {
        self.expiries.clear();
    }
}

impl Default for ExpansionGate {
    fn default() -> Self {
        ExpansionGate::new(DEFAULT_DURATION, DEFAULT_WINDOW)
    }
}
