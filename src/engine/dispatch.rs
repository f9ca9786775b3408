//! Command requests from the chat transport
//!
//! Everything except trials arrives as a `Request`. The reply text is posted
//! to the originating chat and also returned to the caller.

use super::admin::AdminCommand;
use super::{messages, Engine, UserRef};
use crate::game::{ChatId, MessageId, UserId};
use crate::stats::leaderboard::LeaderboardKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A chat command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Challenge {
        chat: ChatId,
        challenger: UserRef,
        target: UserRef,
    },
    Accept {
        chat: ChatId,
        user: UserRef,
    },
    /// Activate a domain expansion; `message_id` is the command's sequence id
    Activate {
        chat: ChatId,
        user: UserRef,
        message_id: MessageId,
    },
    Vent {
        chat: ChatId,
        user: UserRef,
    },
    Stats {
        chat: ChatId,
        user: UserRef,
    },
    Leaderboard {
        chat: ChatId,
        kind: LeaderboardKind,
    },
    History {
        chat: ChatId,
        #[serde(default)]
        limit: Option<usize>,
    },
    Admin {
        chat: ChatId,
        user: UserId,
        command: AdminCommand,
    },
}

impl Request {
    /// Chat the reply belongs to.
    pub fn chat(&self) -> ChatId {
        match self {
            Request::Challenge { chat, .. }
            | Request::Accept { chat, .. }
            | Request::Activate { chat, .. }
            | Request::Vent { chat, .. }
            | Request::Stats { chat, .. }
            | Request::Leaderboard { chat, .. }
            | Request::History { chat, .. }
            | Request::Admin { chat, .. } => *chat,
        }
    }
}

impl Engine {
    /// Run a command, post the reply to its chat and return the reply.
    ///
    /// Rule violations become a reply; nothing here fails.
    pub fn dispatch(&self, request: Request) -> String {
        let chat = request.chat();
        debug!(chat, ?request, "dispatch");

        let reply = match request {
            Request::Challenge {
                chat,
                challenger,
                target,
            } => self
                .challenge(chat, &challenger, &target)
                .map(|outcome| messages::challenge(&outcome)),
            Request::Accept { chat, user } => self
                .accept(chat, user.id)
                .map(|session| messages::duel_started(&session)),
            Request::Activate {
                chat,
                user,
                message_id,
            } => self
                .activate_expansion(chat, user.id, message_id)
                .map(|_| messages::expansion_activated(&user.name, self.config.expansion_duration_secs)),
            Request::Vent { user, .. } => self.vent(user.id, &user.name).map(|_| messages::VENTED.to_string()),
            Request::Stats { user, .. } => Ok(messages::stats(&self.player_stats(user.id, &user.name))),
            Request::Leaderboard { kind, .. } => Ok(messages::leaderboard(kind, &self.leaderboard(kind))),
            Request::History { limit, .. } => Ok(messages::history(&self.duel_history(limit))),
            Request::Admin { user, command, .. } => self.admin(user, command).map(|o| o.render()),
        };

        let text = reply.unwrap_or_else(|e| format!("❌ {}", capitalize(&e.to_string())));
        self.notifier.notify(chat, &text);
        text
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{Harness, ADMIN, CHAT};

    fn alice() -> UserRef {
        UserRef::new(1, "Alice")
    }

    fn bob() -> UserRef {
        UserRef::new(2, "Bob")
    }

    #[test]
    fn test_challenge_then_accept() {
        let h = Harness::new();
        let text = h.engine.dispatch(Request::Challenge {
            chat: CHAT,
            challenger: alice(),
            target: bob(),
        });
        assert!(text.contains("CHALLENGE ISSUED"));

        let text = h.engine.dispatch(Request::Accept { chat: CHAT, user: bob() });
        assert!(text.contains("First turn: Bob"));
        assert_eq!(h.notifier.texts(CHAT).len(), 2);
    }

    #[test]
    fn test_rule_violation_becomes_reply() {
        let h = Harness::new();
        let text = h.engine.dispatch(Request::Challenge {
            chat: CHAT,
            challenger: alice(),
            target: alice(),
        });
        assert_eq!(text, "❌ You cannot challenge yourself");

        let text = h.engine.dispatch(Request::Accept { chat: CHAT, user: bob() });
        assert_eq!(text, "❌ Nobody has challenged you here");
    }

    #[tokio::test]
    async fn test_activate_reply() {
        let h = Harness::new();
        for _ in 0..3 {
            h.roll(1, "Alice", 22).await;
        }
        let seq = h.record(1).last_triple_msg_id.unwrap();
        let text = h.engine.dispatch(Request::Activate {
            chat: CHAT,
            user: alice(),
            message_id: seq + 2,
        });
        assert!(text.contains("DOMAIN EXPANSION"));

        let text = h.engine.dispatch(Request::Activate {
            chat: CHAT,
            user: alice(),
            message_id: seq + 3,
        });
        assert!(text.contains("need a triple"));
    }

    #[test]
    fn test_stats_and_leaderboard() {
        let h = Harness::new();
        let text = h.engine.dispatch(Request::Stats { chat: CHAT, user: bob() });
        assert!(text.starts_with("📊 Bob"));

        let text = h.engine.dispatch(Request::Leaderboard {
            chat: CHAT,
            kind: LeaderboardKind::Points,
        });
        assert!(text.contains("1. Bob: 0 pts"));
    }

    #[test]
    fn test_admin_via_dispatch() {
        let h = Harness::new();
        let text = h.engine.dispatch(Request::Admin {
            chat: CHAT,
            user: 1,
            command: AdminCommand::ToggleDebug,
        });
        assert!(text.contains("permission"));

        let text = h.engine.dispatch(Request::Admin {
            chat: CHAT,
            user: ADMIN,
            command: AdminCommand::ToggleDebug,
        });
        assert_eq!(text, "🛠 Debug mode on.");
    }

    #[test]
    fn test_request_wire_shape() {
        let json = r#"{"op": "history", "chat": 5}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req, Request::History { chat: 5, limit: None });

        let json = r#"{"op": "leaderboard", "chat": 5, "kind": "win_rate"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::Leaderboard {
                chat: 5,
                kind: LeaderboardKind::WinRate
            }
        );
    }
}
