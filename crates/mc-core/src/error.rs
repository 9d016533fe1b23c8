use thiserror::Error;

use crate::record::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("invalid {kind} record: {reason}")]
    InvalidRecord { kind: EntityKind, reason: String },
    #[error("unknown entity kind `{0}`")]
    UnknownEntityKind(String),
}

impl SyncError {
    pub(crate) fn invalid(kind: EntityKind, reason: impl Into<String>) -> Self {
        SyncError::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }
}
