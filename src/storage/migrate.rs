//! Record upgrade and legacy JSON import
//!
//! Every persisted record passes through [`upgrade_record`] once, at load
//! time, and comes out as a fully populated `PlayerRecord`. The legacy
//! importers read the JSON files older deployments kept on disk:
//! - scores: object keyed by user id, `_`-prefixed metadata keys
//! - duels: array of history entries
//! - users: object mapping user id to display name

use crate::error::StorageError;
use crate::game::duel::DuelHistoryEntry;
use crate::game::UserId;
use crate::stats::{Achievement, PlayerRecord, RecordBook};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Version written by the last layout change of stored records
pub const RECORD_VERSION: u32 = 2;

/// Legacy field name → current field name
const RENAMED_FIELDS: [(&str, &str); 7] = [
    ("total_slots", "total_trials"),
    ("double", "doubles"),
    ("triple", "triples"),
    ("quad", "quads"),
    ("quint", "quints"),
    ("last_slot_ts", "last_trial_ts"),
    ("last_bestemmia_sfiga", "last_vent_sfiga"),
];

/// Integer fields older writers sometimes stored as floats
const INTEGER_FIELDS: [&str; 2] = ["elo", "points"];

/// Turn any stored record object into a current `PlayerRecord`.
///
/// Missing fields take their defaults, legacy names are renamed, unknown
/// achievement ids are dropped and unknown fields are ignored.
pub fn upgrade_record(value: Value) -> Result<PlayerRecord, StorageError> {
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(StorageError::Malformed {
                what: "player record",
                reason: format!("expected an object, found {}", kind_of(&other)),
            })
        }
    };

    for (old, new) in RENAMED_FIELDS {
        if let Some(v) = fields.remove(old) {
            fields.entry(new.to_string()).or_insert(v);
        }
    }

    for name in INTEGER_FIELDS {
        if let Some(n) = fields.get(name).and_then(Value::as_f64) {
            if fields.get(name).is_some_and(|v| !v.is_i64()) {
                fields.insert(name.to_string(), Value::from(n.round() as i64));
            }
        }
    }

    if let Some(list) = fields.remove("achievements") {
        let kept: Vec<Value> = list
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .filter(|id| Achievement::from_id(id).is_some())
                    .map(Value::from)
                    .collect()
            })
            .unwrap_or_default();
        fields.insert("achievements".to_string(), Value::Array(kept));
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| StorageError::Malformed {
        what: "player record",
        reason: e.to_string(),
    })
}

/// Outcome of importing a legacy scores file.
#[derive(Debug, Default)]
pub struct ScoresImport {
    pub book: RecordBook,
    /// Stored version marker (1 when absent)
    pub source_version: u32,
    /// Entries that could not be imported
    pub rejected: Vec<String>,
}

/// Parse a legacy `scores.json` document.
pub fn import_legacy_scores(text: &str) -> Result<ScoresImport, StorageError> {
    let root = parse_object(text, "scores file")?;
    let mut import = ScoresImport {
        source_version: root
            .get("_version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(1),
        ..ScoresImport::default()
    };

    for (key, value) in root {
        if key.starts_with('_') {
            continue;
        }
        let Ok(id) = key.parse::<UserId>() else {
            warn!(key = %key, "skipping record with non-numeric user id");
            import.rejected.push(key);
            continue;
        };
        match upgrade_record(value) {
            Ok(record) => import.book.insert(id, record),
            Err(e) => {
                warn!(user = id, error = %e, "skipping malformed record");
                import.rejected.push(key);
            }
        }
    }
    Ok(import)
}

/// Parse a legacy duel log. Only a JSON array is accepted.
pub fn import_legacy_duels(text: &str) -> Result<Vec<DuelHistoryEntry>, StorageError> {
    let items = match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items,
        other => {
            return Err(StorageError::Malformed {
                what: "duel log",
                reason: format!("expected an array, found {}", kind_of(&other)),
            })
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match history_entry(&item) {
            Some(entry) => entries.push(entry),
            None => warn!(index, "skipping malformed duel history entry"),
        }
    }
    Ok(entries)
}

/// Parse a legacy users directory.
pub fn import_legacy_users(text: &str) -> Result<BTreeMap<UserId, String>, StorageError> {
    let root = parse_object(text, "users file")?;
    Ok(root
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .filter_map(|(key, value)| {
            let id = key.parse::<UserId>().ok()?;
            let name = value.as_str()?.to_string();
            Some((id, name))
        })
        .collect())
}

/// Parse a timestamp written either as RFC 3339 or as a naive ISO string
/// (taken as UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn history_entry(item: &Value) -> Option<DuelHistoryEntry> {
    let obj = item.as_object()?;
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let score = |key: &str| obj.get(key).and_then(Value::as_u64).map(|n| n as u32);

    Some(DuelHistoryEntry {
        p1: text("p1")?,
        p2: text("p2")?,
        score1: score("score1")?,
        score2: score("score2")?,
        winner: text("winner")?,
        timestamp: obj
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)?,
    })
}

fn parse_object(text: &str, what: &'static str) -> Result<Map<String, Value>, StorageError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Malformed {
            what,
            reason: format!("expected an object, found {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
