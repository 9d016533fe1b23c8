use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{row_timestamp, RowStore, SnapshotQuery};
use crate::record::EntityKind;

/// In-process row store for tests and demos. Rows keep insertion order;
/// rows without a parseable timestamp sort last.
#[derive(Default)]
pub struct MemoryRowStore {
    rows: Mutex<HashMap<EntityKind, Vec<Value>>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, row: Value) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(row);
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn select(&self, kind: EntityKind, query: &SnapshotQuery) -> Vec<Value> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        // stable sort keeps insertion order among equal timestamps
        rows.sort_by(|a, b| {
            let ta = row_timestamp(a, query.order_by);
            let tb = row_timestamp(b, query.order_by);
            match (ta, tb) {
                (Some(x), Some(y)) if query.descending => y.cmp(&x),
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn fetch(&self, kind: EntityKind, query: &SnapshotQuery) -> Result<Vec<Value>> {
        Ok(self.select(kind, query))
    }
}
