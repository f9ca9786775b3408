//! Outbound notification seam
//!
//! The engine never talks to the chat directly. It hands `Notice`s to a
//! `Notifier`, which is fire-and-forget: delivery failures stay inside the
//! notifier.

use crate::game::{ChatId, MessageId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Something the chat transport should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// Post a message in a chat
    Notify { chat: ChatId, text: String },
    /// Delete a message, if the transport allows it
    Retract { chat: ChatId, message_id: MessageId },
}

/// Receives the engine's outbound notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, chat: ChatId, text: &str);
    fn retract(&self, chat: ChatId, message_id: MessageId);
}

/// Publishes notices on a broadcast channel so every connected bridge sees
/// them.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` notices per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastNotifier { tx }
    }

    /// A new receiver that sees every notice sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    fn publish(&self, notice: Notice) {
        // No subscribers means no bridge is connected; the notice is dropped
        if self.tx.send(notice).is_err() {
            trace!("notice dropped, no bridge connected");
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, chat: ChatId, text: &str) {
        self.publish(Notice::Notify {
            chat,
            text: text.to_string(),
        });
    }

    fn retract(&self, chat: ChatId, message_id: MessageId) {
        self.publish(Notice::Retract { chat, message_id });
    }
}

/// Keeps every notice for later inspection.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: std::sync::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    /// Texts posted to `chat`, in order.
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Notify { chat: c, text } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    /// All texts joined, for substring checks.
    pub fn transcript(&self) -> String {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Notify { text, .. } => Some(text),
                Notice::Retract { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, chat: ChatId, text: &str) {
        self.notices.lock().unwrap().push(Notice::Notify {
            chat,
            text: text.to_string(),
        });
    }

    fn retract(&self, chat: ChatId, message_id: MessageId) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Retract { chat, message_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let notifier = BroadcastNotifier::new(16);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.notify(5, "hello");
        notifier.retract(5, 99);

        for rx in [&mut a, &mut b] {
            assert_eq!(
                rx.recv().await.unwrap(),
                Notice::Notify { chat: 5, text: "hello".into() }
            );
            assert_eq!(rx.recv().await.unwrap(), Notice::Retract { chat: 5, message_id: 99 });
        }
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(4);
        notifier.notify(1, "nobody listens");
    }

    #[test]
    fn test_notice_wire_shape() {
        let json = serde_json::to_value(Notice::Retract { chat: -3, message_id: 8 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "retract", "chat": -3, "message_id": 8}));
    }
}
