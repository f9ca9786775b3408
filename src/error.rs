//! Error types shared across the engine.

use crate::game::UserId;
use thiserror::Error;

/// Refusals produced by game rules and admin paths.
///
/// The `Display` text is what the chat sees, so keep it short and addressed
/// to the player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// A player tried to challenge themselves.
    #[error("you cannot challenge yourself")]
    SelfChallenge,
    /// A duel is already running in this chat.
    #[error("a duel is already running in this chat, finish that one first")]
    DuelInProgress,
    /// Another challenge is waiting for an answer in this chat.
    #[error("a challenge is already waiting for an answer in this chat")]
    ChallengePending,
    /// The accepter has no challenge addressed to them.
    #[error("nobody has challenged you here")]
    NoPendingChallenge,
    /// Expansion requested without a streak-3 marker.
    #[error("you need a triple before you can expand your domain")]
    NoTripleMarker,
    /// Expansion requested too many messages after the triple.
    #[error("the activation window has closed, the triple no longer resonates")]
    WindowExpired,
    /// Expansion already running in this chat.
    #[error("the domain is already expanded")]
    ExpansionActive,
    /// Vent requested before enough consecutive losses.
    #[error("you need {needed} more losses before you can vent")]
    VentNotEarned { needed: u32 },
    /// Admin path addressed an id with no record.
    #[error("user {0} not found")]
    NotFound(UserId),
    /// Caller is not the configured admin.
    #[error("you do not have permission to do that")]
    PermissionDenied,
}

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Record payload could not be encoded or decoded
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Could not determine data directory
    #[error("could not determine data directory")]
    NoDataDirectory,
    /// Schema version mismatch (future version)
    #[error("database schema version {found} is newer than supported version {supported}")]
    FutureSchemaVersion { found: u32, supported: u32 },
    /// Migration failed
    #[error("migration from v{from} to v{to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
    /// Imported data does not have the expected shape
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_error_messages_are_user_facing() {
        assert_eq!(
            GameError::VentNotEarned { needed: 7 }.to_string(),
            "you need 7 more losses before you can vent"
        );
        assert_eq!(GameError::NotFound(42).to_string(), "user 42 not found");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FutureSchemaVersion { found: 3, supported: 1 };
        assert_eq!(
            err.to_string(),
            "database schema version 3 is newer than supported version 1"
        );
    }
}
