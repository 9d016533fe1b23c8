use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Entity kinds the dashboard keeps live.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agents,
    Tasks,
    Events,
    Messages,
    Memories,
    Content,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Agents,
        EntityKind::Tasks,
        EntityKind::Events,
        EntityKind::Messages,
        EntityKind::Memories,
        EntityKind::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Agents => "agents",
            EntityKind::Tasks => "tasks",
            EntityKind::Events => "events",
            EntityKind::Messages => "messages",
            EntityKind::Memories => "memories",
            EntityKind::Content => "content",
        }
    }

    /// Row-store table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Agents => "agent_status",
            EntityKind::Tasks => "tasks",
            EntityKind::Events => "events",
            EntityKind::Messages => "messages",
            EntityKind::Memories => "memories",
            EntityKind::Content => "content_items",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            EntityKind::Agents => mc_topics::TOPIC_AGENT_STATUS_CHANGED,
            EntityKind::Tasks => mc_topics::TOPIC_TASKS_CHANGED,
            EntityKind::Events => mc_topics::TOPIC_EVENTS_CHANGED,
            EntityKind::Messages => mc_topics::TOPIC_MESSAGES_CHANGED,
            EntityKind::Memories => mc_topics::TOPIC_MEMORIES_CHANGED,
            EntityKind::Content => mc_topics::TOPIC_CONTENT_CHANGED,
        }
    }

    /// Accepts the kind slug or its table name.
    pub fn from_slug(value: &str) -> Result<Self, SyncError> {
        let normalized = value.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.table() == normalized)
            .ok_or_else(|| SyncError::UnknownEntityKind(value.to_string()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::from_slug(s)
    }
}

/// A typed row that can live in a [`crate::LiveCollection`].
pub trait LiveRecord: Clone + Serialize + DeserializeOwned + Send + 'static {
    const KIND: EntityKind;

    /// Stable key, `None` when the row carries no usable id.
    fn identity(&self) -> Option<&str>;

    /// Timestamp used for newest-first ordering and date grouping.
    fn occurred_at(&self) -> Option<DateTime<Utc>>;
}

/// `Some(id)` unless the id is empty or whitespace.
pub fn usable_identity(id: &str) -> Option<&str> {
    if id.trim().is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Row ids arrive as strings or integers depending on the table.
pub(crate) fn de_identity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("unsupported id value: {other}"))),
    }
}

/// Extract a row id from a raw JSON row.
pub fn row_identity(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => usable_identity(s).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
