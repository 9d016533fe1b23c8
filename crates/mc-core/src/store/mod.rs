//! Initial snapshot fetch from the external row store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::collection::{CollectionPolicy, OrderingPolicy};
use crate::record::{EntityKind, LiveRecord};

mod memory;
mod sqlite;

pub use memory::MemoryRowStore;
pub use sqlite::SqliteRowStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderColumn {
    CreatedAt,
    UpdatedAt,
}

impl OrderColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderColumn::CreatedAt => "created_at",
            OrderColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub order_by: OrderColumn,
    pub descending: bool,
    pub limit: Option<usize>,
}

impl SnapshotQuery {
    pub fn newest_first(limit: Option<usize>) -> Self {
        Self {
            order_by: OrderColumn::CreatedAt,
            descending: true,
            limit,
        }
    }

    pub fn oldest_first() -> Self {
        Self {
            order_by: OrderColumn::CreatedAt,
            descending: false,
            limit: None,
        }
    }

    /// Prepending collections load their newest rows, bounded by the
    /// capacity; stable-order collections load everything in creation order.
    pub fn for_policy(policy: &CollectionPolicy) -> Self {
        match policy.ordering {
            OrderingPolicy::StableOrder => Self::oldest_first(),
            OrderingPolicy::PrependNewest | OrderingPolicy::AppendOnlyLog => {
                Self::newest_first(policy.capacity)
            }
        }
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn fetch(&self, kind: EntityKind, query: &SnapshotQuery) -> Result<Vec<Value>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    pub records: Vec<R>,
    /// Rows that did not decode into `R`.
    pub skipped: usize,
}

pub async fn load_snapshot<R: LiveRecord>(
    store: &dyn RowStore,
    query: &SnapshotQuery,
) -> Result<Snapshot<R>> {
    let rows = store.fetch(R::KIND, query).await?;
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match serde_json::from_value::<R>(row) {
            Ok(record) => records.push(record),
            Err(err) => {
                skipped += 1;
                warn!(target: "mc.live", kind = R::KIND.as_str(), %err, "skipping snapshot row");
            }
        }
    }
    Ok(Snapshot { records, skipped })
}

/// Timestamp of `column` in a raw row, when present and parseable.
pub(crate) fn row_timestamp(row: &Value, column: OrderColumn) -> Option<DateTime<Utc>> {
    row.get(column.as_str())
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TaskItem;
    use serde_json::json;

    #[test]
    fn query_follows_policy() {
        assert_eq!(
            SnapshotQuery::for_policy(&CollectionPolicy::default_for(EntityKind::Messages)),
            SnapshotQuery::newest_first(Some(50))
        );
        assert_eq!(
            SnapshotQuery::for_policy(&CollectionPolicy::default_for(EntityKind::Agents)),
            SnapshotQuery::oldest_first()
        );
    }

    #[tokio::test]
    async fn load_snapshot_skips_undecodable_rows() {
        let store = MemoryRowStore::new();
        store.insert(
            EntityKind::Tasks,
            json!({"id": "t1", "created_at": "2024-01-01T00:00:00Z"}),
        );
        store.insert(
            EntityKind::Tasks,
            json!({"id": {"nested": true}, "created_at": "2024-01-02T00:00:00Z"}),
        );
        let snap: Snapshot<TaskItem> =
            load_snapshot(&store, &SnapshotQuery::newest_first(None))
                .await
                .expect("snapshot");
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.skipped, 1);
    }
}
