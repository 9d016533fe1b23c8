use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

mod bus_source;
pub mod simulated;

pub use bus_source::BusSource;
pub use simulated::SimulatedSource;

/// Minimal event envelope (RFC3339 time).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    pub time: String,
    pub kind: String,
    pub payload: Value,
}

/// A simple broadcast bus for JSON-serializable events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish<T: Serialize>(&self, kind: &str, payload: &T) {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let val =
            serde_json::to_value(payload).unwrap_or_else(|_| serde_json::json!({"_ser":"error"}));
        let _ = self.tx.send(Envelope {
            time: now,
            kind: kind.to_string(),
            payload: val,
        });
    }

    /// Publish a row change on `topic`.
    pub fn publish_change(&self, topic: &str, change: &ChangeEvent) {
        self.publish(topic, change);
    }
}

/// Row-change type as reported by the realtime backend.
///
/// Anything other than insert/update (deletes, truncates) decodes to
/// `Unsupported`; consumers skip those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    #[serde(alias = "INSERT", alias = "Insert")]
    Insert,
    #[serde(alias = "UPDATE", alias = "Update")]
    Update,
    #[serde(other)]
    Unsupported,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "insert",
            ChangeType::Update => "update",
            ChangeType::Unsupported => "unsupported",
        }
    }
}

/// Wire shape of one row change: the entity (table) it belongs to, the
/// change type and the complete new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: String,
    pub event_type: ChangeType,
    #[serde(default)]
    pub record: Value,
}

impl ChangeEvent {
    pub fn new(entity: impl Into<String>, event_type: ChangeType, record: Value) -> Self {
        Self {
            entity: entity.into(),
            event_type,
            record,
        }
    }

    /// A row that fails to serialize becomes `null`, which consumers reject
    /// as a malformed record.
    pub fn insert<T: Serialize>(entity: impl Into<String>, record: &T) -> Self {
        Self::new(
            entity,
            ChangeType::Insert,
            serde_json::to_value(record).unwrap_or(Value::Null),
        )
    }

    pub fn update<T: Serialize>(entity: impl Into<String>, record: &T) -> Self {
        Self::new(
            entity,
            ChangeType::Update,
            serde_json::to_value(record).unwrap_or(Value::Null),
        )
    }
}

/// Callback invoked for every change delivered on a subscription.
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Handle returned by [`NotificationSource::subscribe`].
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    topic: String,
}

impl Subscription {
    pub fn new(id: u64, topic: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Delivery side of live row changes.
///
/// Implementations may drop, replay or reorder changes across reconnects;
/// they must stop calling a handler as soon as its subscription is
/// unsubscribed.
pub trait NotificationSource: Send + Sync {
    fn subscribe(&self, topic: &str, handler: ChangeHandler) -> Subscription;
    fn unsubscribe(&self, subscription: Subscription);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn change_type_accepts_backend_spellings() {
        for (raw, expected) in [
            ("\"INSERT\"", ChangeType::Insert),
            ("\"insert\"", ChangeType::Insert),
            ("\"Update\"", ChangeType::Update),
            ("\"DELETE\"", ChangeType::Unsupported),
        ] {
            let parsed: ChangeType = serde_json::from_str(raw).expect(raw);
            assert_eq!(parsed, expected, "{raw}");
        }
    }

    #[test]
    fn change_event_defaults_missing_record_to_null() {
        let ev: ChangeEvent =
            serde_json::from_value(json!({"entity": "tasks", "event_type": "insert"}))
                .expect("decode");
        assert_eq!(ev.record, Value::Null);
        assert_eq!(ev.event_type.as_str(), "insert");
    }

    #[tokio::test]
    async fn bus_publish_wraps_payload_in_envelope() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let change = ChangeEvent::insert("tasks", &json!({"id": "t1"}));
        bus.publish_change(mc_topics::TOPIC_TASKS_CHANGED, &change);
        let env = rx.recv().await.expect("envelope");
        assert_eq!(env.kind, mc_topics::TOPIC_TASKS_CHANGED);
        let decoded: ChangeEvent = serde_json::from_value(env.payload).expect("change");
        assert_eq!(decoded, change);
        assert!(env.time.ends_with('Z'));
    }
}
