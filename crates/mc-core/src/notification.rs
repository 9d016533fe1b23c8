use mc_events::{ChangeEvent, ChangeType};

use crate::error::SyncError;
use crate::record::{EntityKind, LiveRecord};

/// One row change, always carrying the complete new row.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification<R> {
    Inserted(R),
    Updated(R),
}

impl<R> ChangeNotification<R> {
    pub fn record(&self) -> &R {
        match self {
            ChangeNotification::Inserted(r) | ChangeNotification::Updated(r) => r,
        }
    }

    pub fn into_record(self) -> R {
        match self {
            ChangeNotification::Inserted(r) | ChangeNotification::Updated(r) => r,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeNotification::Inserted(_) => ChangeType::Insert,
            ChangeNotification::Updated(_) => ChangeType::Update,
        }
    }
}

/// Result of decoding a wire [`ChangeEvent`] for a typed collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<R> {
    Change(ChangeNotification<R>),
    /// The event belongs to another entity kind.
    Foreign(EntityKind),
    /// Deletes and other change types the collections do not model.
    Unsupported(ChangeType),
}

impl<R: LiveRecord> ChangeNotification<R> {
    /// Decode a wire event. Identity is not checked here; `apply` does that.
    pub fn decode(event: ChangeEvent) -> Result<Decoded<R>, SyncError> {
        let kind = EntityKind::from_slug(&event.entity)?;
        if kind != R::KIND {
            return Ok(Decoded::Foreign(kind));
        }
        let wrap = match event.event_type {
            ChangeType::Insert => ChangeNotification::Inserted,
            ChangeType::Update => ChangeNotification::Updated,
            other @ ChangeType::Unsupported => return Ok(Decoded::Unsupported(other)),
        };
        let record: R = serde_json::from_value(event.record)
            .map_err(|err| SyncError::invalid(R::KIND, err.to_string()))?;
        Ok(Decoded::Change(wrap(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AgentState, AgentStatus, TaskItem};
    use serde_json::json;

    #[test]
    fn decodes_insert_and_update() {
        let ev = ChangeEvent::new(
            "agent_status",
            ChangeType::Update,
            json!({"id": "main", "status": "active"}),
        );
        match ChangeNotification::<AgentStatus>::decode(ev).expect("decode") {
            Decoded::Change(ChangeNotification::Updated(agent)) => {
                assert_eq!(agent.id, "main");
                assert_eq!(agent.status, AgentState::Active);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_kinds_are_foreign() {
        let ev = ChangeEvent::new("tasks", ChangeType::Insert, json!({"id": "t1"}));
        assert_eq!(
            ChangeNotification::<AgentStatus>::decode(ev).expect("decode"),
            Decoded::Foreign(EntityKind::Tasks)
        );
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let ev = ChangeEvent::new("finance_rows", ChangeType::Insert, json!({"id": "f1"}));
        assert_eq!(
            ChangeNotification::<TaskItem>::decode(ev),
            Err(SyncError::UnknownEntityKind("finance_rows".into()))
        );
    }

    #[test]
    fn deletes_are_unsupported() {
        let ev = ChangeEvent::new("tasks", ChangeType::Unsupported, json!({"id": "t1"}));
        assert_eq!(
            ChangeNotification::<TaskItem>::decode(ev).expect("decode"),
            Decoded::Unsupported(ChangeType::Unsupported)
        );
    }

    #[test]
    fn undecodable_record_is_invalid() {
        let ev = ChangeEvent::new("tasks", ChangeType::Insert, json!("not an object"));
        let err = ChangeNotification::<TaskItem>::decode(ev).unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidRecord {
                kind: EntityKind::Tasks,
                ..
            }
        ));
    }
}
