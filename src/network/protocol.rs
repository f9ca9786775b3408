//! Gateway wire protocol
//!
//! Length-prefixed JSON frames over TCP: a 4-byte big-endian length, then
//! that many bytes of UTF-8 JSON.

use crate::engine::dispatch::Request;
use crate::engine::notify::Notice;
use crate::engine::TrialRequest;
use crate::game::{ChatId, MessageId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Messages from a chat bridge to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A slot roll
    Trial(TrialRequest),
    /// Any other chat command
    Command(Request),
    Ping { nonce: u64 },
}

/// Messages from the engine to every connected bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Post `text` in `chat`
    Notify { chat: ChatId, text: String },
    /// Delete a message
    Retract { chat: ChatId, message_id: MessageId },
    Pong { nonce: u64 },
    /// The last frame could not be understood
    Error { message: String },
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::Notify { chat, text } => ServerMessage::Notify { chat, text },
            Notice::Retract { chat, message_id } => ServerMessage::Retract { chat, message_id },
        }
    }
}

/// Serialize a message into a complete frame.
pub fn encode<T: Serialize>(msg: &T) -> io::Result<Vec<u8>> {
    let json = serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if json.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }
    let mut bytes = Vec::with_capacity(4 + json.len());
    bytes.extend_from_slice(&(json.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&json);
    Ok(bytes)
}

/// Parse a frame body.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Write one message as a frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(msg)?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

/// Read one frame body.
///
/// Returns `Ok(None)` when the peer closed the connection between frames.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TrustFlags, UserRef};
    use crate::stats::leaderboard::LeaderboardKind;

    #[test]
    fn test_frame_layout() {
        let bytes = encode(&ServerMessage::Pong { nonce: 7 }).unwrap();
        let body = br#"{"type":"pong","nonce":7}"#;
        assert_eq!(&bytes[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..], body);
    }

    #[test]
    fn test_trial_wire_shape() {
        let json = r#"{
            "type": "trial",
            "body": {
                "chat": -100,
                "user": {"id": 3, "name": "Ann"},
                "message_id": 41,
                "value": 64,
                "flags": {"forwarded": true}
            }
        }"#;
        let msg: ClientMessage = decode(json.as_bytes()).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Trial(TrialRequest {
                chat: -100,
                user: UserRef::new(3, "Ann"),
                message_id: 41,
                value: 64,
                flags: TrustFlags {
                    forwarded: true,
                    ..TrustFlags::default()
                },
            })
        );
    }

    #[test]
    fn test_missing_flags_default_to_genuine() {
        let json = r#"{"type":"trial","body":{"chat":1,"user":{"id":1,"name":"A"},"message_id":1,"value":1}}"#;
        match decode::<ClientMessage>(json.as_bytes()).unwrap() {
            ClientMessage::Trial(t) => assert!(t.flags.genuine),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_command_wire_shape() {
        let json = r#"{"type":"command","body":{"op":"leaderboard","chat":2,"kind":"elo"}}"#;
        assert_eq!(
            decode::<ClientMessage>(json.as_bytes()).unwrap(),
            ClientMessage::Command(Request::Leaderboard {
                chat: 2,
                kind: LeaderboardKind::Elo
            })
        );
    }

    #[test]
    fn test_notice_converts_to_server_message() {
        let msg = ServerMessage::from(Notice::Retract { chat: 4, message_id: 9 });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({"type": "retract", "chat": 4, "message_id": 9})
        );
    }

    #[tokio::test]
    async fn test_read_write_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            write_frame(&mut a, &ClientMessage::Ping { nonce: 1 }).await.unwrap();
            write_frame(&mut a, &ClientMessage::Ping { nonce: 2 }).await.unwrap();
        });

        let first = read_frame(&mut b).await.unwrap().unwrap();
        let second = read_frame(&mut b).await.unwrap().unwrap();
        writer.await.unwrap();

        assert_eq!(decode::<ClientMessage>(&first).unwrap(), ClientMessage::Ping { nonce: 1 });
        assert_eq!(decode::<ClientMessage>(&second).unwrap(), ClientMessage::Ping { nonce: 2 });
        // Writer dropped: clean end of stream
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        let mut reader: &[u8] = &len;
        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let mut bytes = 10u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let mut reader: &[u8] = &bytes;
        assert!(read_frame(&mut reader).await.is_err());
    }
}
