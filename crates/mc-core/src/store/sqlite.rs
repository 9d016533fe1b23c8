use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use super::{row_timestamp, OrderColumn, RowStore, SnapshotQuery};
use crate::record::{row_identity, EntityKind};

/// SQLite-backed row store: one `rows` table keyed by (kind, id), with the
/// ordering columns lifted out of the JSON payload.
#[derive(Clone)]
pub struct SqliteRowStore {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteRowStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Busy timeout (default 5000ms; override with MC_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("MC_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let busy_timeout = Duration::from_millis(busy_ms);
        conn.busy_timeout(busy_timeout)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
            busy_timeout,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rows (
              kind TEXT NOT NULL,
              id TEXT NOT NULL,
              created_at TEXT,
              updated_at TEXT,
              payload TEXT NOT NULL,
              PRIMARY KEY (kind, id)
            );
            CREATE INDEX IF NOT EXISTS idx_rows_created ON rows(kind, created_at);
            CREATE INDEX IF NOT EXISTS idx_rows_updated ON rows(kind, updated_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Insert or replace a row. The row must carry an `id`.
    pub fn upsert(&self, kind: EntityKind, row: &Value) -> Result<()> {
        let id = row_identity(row).ok_or_else(|| anyhow!("{kind} row has no id"))?;
        // normalised so that text ordering matches time ordering
        let stamp = |column| {
            row_timestamp(row, column).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rows(kind,id,created_at,updated_at,payload) VALUES (?,?,?,?,?)
             ON CONFLICT(kind,id) DO UPDATE SET
               created_at=excluded.created_at,
               updated_at=excluded.updated_at,
               payload=excluded.payload",
            params![
                kind.as_str(),
                id,
                stamp(OrderColumn::CreatedAt),
                stamp(OrderColumn::UpdatedAt),
                serde_json::to_string(row)?,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self, kind: EntityKind) -> Result<i64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rows WHERE kind=?",
            params![kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn select(&self, kind: EntityKind, query: &SnapshotQuery) -> Result<Vec<Value>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT id, payload FROM rows WHERE kind=? ORDER BY {col} IS NULL, {col} {dir}, rowid ASC LIMIT ?",
            col = query.order_by.as_str(),
            dir = if query.descending { "DESC" } else { "ASC" },
        );
        // LIMIT -1 means no limit in SQLite
        let limit: i64 = query
            .limit
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![kind.as_str(), limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            match serde_json::from_str(&payload) {
                Ok(value) => out.push(value),
                Err(err) => warn!(
                    target: "mc.live",
                    kind = kind.as_str(),
                    id = %id,
                    %err,
                    "skipping corrupt stored payload"
                ),
            }
        }
        Ok(out)
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------

    pub async fn upsert_async(&self, kind: EntityKind, row: Value) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.upsert(kind, &row))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn select_async(
        &self,
        kind: EntityKind,
        query: SnapshotQuery,
    ) -> Result<Vec<Value>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.select(kind, &query))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn fetch(&self, kind: EntityKind, query: &SnapshotQuery) -> Result<Vec<Value>> {
        self.select_async(kind, *query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SqliteRowStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteRowStore::open(&dir.path().join("live.sqlite")).expect("open");
        (dir, store)
    }

    #[test]
    #[serial_test::serial]
    fn busy_timeout_comes_from_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::env::set_var("MC_SQLITE_BUSY_MS", "250");
        let tuned = SqliteRowStore::open(&dir.path().join("a.sqlite"));
        std::env::remove_var("MC_SQLITE_BUSY_MS");
        assert_eq!(tuned.expect("open").busy_timeout(), Duration::from_millis(250));

        let default = SqliteRowStore::open(&dir.path().join("b.sqlite")).expect("open");
        assert_eq!(default.busy_timeout(), Duration::from_millis(5000));
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["id"].as_str()).collect()
    }

    #[test]
    fn upsert_replaces_by_kind_and_id() {
        let (_dir, store) = store();
        store
            .upsert(EntityKind::Tasks, &json!({"id": "t1", "title": "draft"}))
            .unwrap();
        store
            .upsert(EntityKind::Tasks, &json!({"id": "t1", "title": "final"}))
            .unwrap();
        store
            .upsert(EntityKind::Content, &json!({"id": "t1", "title": "other kind"}))
            .unwrap();
        assert_eq!(store.count(EntityKind::Tasks).unwrap(), 1);
        let rows = store
            .select(EntityKind::Tasks, &SnapshotQuery::oldest_first())
            .unwrap();
        assert_eq!(rows[0]["title"], "final");
    }

    #[test]
    fn select_skips_corrupt_payloads() {
        let (_dir, store) = store();
        store
            .upsert(EntityKind::Tasks, &json!({"id": "t1"}))
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO rows(kind, id, payload) VALUES ('tasks', 't2', '{not json')",
                [],
            )
            .unwrap();
        assert_eq!(store.count(EntityKind::Tasks).unwrap(), 2);
        let rows = store
            .select(EntityKind::Tasks, &SnapshotQuery::oldest_first())
            .unwrap();
        assert_eq!(ids(&rows), vec!["t1"]);
    }

    #[test]
    fn upsert_requires_id() {
        let (_dir, store) = store();
        assert!(store
            .upsert(EntityKind::Tasks, &json!({"title": "no id"}))
            .is_err());
    }

    #[test]
    fn select_orders_newest_first_with_limit() {
        let (_dir, store) = store();
        for (id, ts) in [
            ("m1", "2024-01-01T00:00:00Z"),
            ("m2", "2024-01-01T12:00:00+05:00"),
            ("m3", "2024-01-02T00:00:00Z"),
        ] {
            store
                .upsert(EntityKind::Messages, &json!({"id": id, "created_at": ts}))
                .unwrap();
        }
        store
            .upsert(EntityKind::Messages, &json!({"id": "undated"}))
            .unwrap();

        let newest = store
            .select(EntityKind::Messages, &SnapshotQuery::newest_first(Some(2)))
            .unwrap();
        assert_eq!(ids(&newest), vec!["m3", "m2"]);

        let oldest = store
            .select(EntityKind::Messages, &SnapshotQuery::oldest_first())
            .unwrap();
        assert_eq!(ids(&oldest), vec!["m1", "m2", "m3", "undated"]);
    }

    #[tokio::test]
    async fn fetch_runs_off_the_executor() {
        let (_dir, store) = store();
        store
            .upsert_async(EntityKind::Agents, json!({"id": 1, "status": "idle"}))
            .await
            .unwrap();
        let rows = store
            .fetch(EntityKind::Agents, &SnapshotQuery::oldest_first())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 1);
    }
}
