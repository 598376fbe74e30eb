use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Error type for push-event decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid event json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// `created` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: i64,
}

/// `updated` payload. Absent fields are left alone; an explicit `null`
/// description clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
}

/// `moved` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMoved {
    pub id: String,
    #[serde(default)]
    pub from_column_id: Option<String>,
    pub to_column_id: String,
    pub position: i64,
}

/// `deleted` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub id: String,
}

/// The closed set of change kinds, plus a fallback for schema drift
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created(ItemCreated),
    Updated(ItemUpdated),
    Moved(ItemMoved),
    Deleted(ItemDeleted),
    /// A `type` this client does not know; carries the raw name
    Unknown(String),
}

impl ChangeKind {
    pub fn name(&self) -> &str {
        match self {
            ChangeKind::Created(_) => "created",
            ChangeKind::Updated(_) => "updated",
            ChangeKind::Moved(_) => "moved",
            ChangeKind::Deleted(_) => "deleted",
            ChangeKind::Unknown(name) => name,
        }
    }
}

/// One push-channel event, scoped to a board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub board_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: ChangeKind,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(alias = "groupId", alias = "group_id")]
    board_id: String,
    #[serde(default, alias = "timestamp")]
    ts: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: Value,
}

fn payload<T: for<'de> Deserialize<'de>>(kind: &'static str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Payload { kind, source })
}

/// Decode one JSON event. `task_`-prefixed type names are accepted as
/// aliases; unknown types decode to [`ChangeKind::Unknown`].
pub fn decode_event(text: &str) -> Result<ChangeEvent, DecodeError> {
    let raw: RawEvent = serde_json::from_str(text)?;
    let name = raw.kind.strip_prefix("task_").unwrap_or(&raw.kind);
    let kind = match name {
        "created" => ChangeKind::Created(payload("created", raw.payload)?),
        "updated" => ChangeKind::Updated(payload("updated", raw.payload)?),
        "moved" => ChangeKind::Moved(payload("moved", raw.payload)?),
        "deleted" => ChangeKind::Deleted(payload("deleted", raw.payload)?),
        _ => ChangeKind::Unknown(raw.kind.clone()),
    };
    Ok(ChangeEvent {
        board_id: raw.board_id,
        timestamp: raw.ts,
        kind,
    })
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
