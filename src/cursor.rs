//! Per-partition sync cursor storage.
//!
//! A cursor is advanced only after its batch of change records has been
//! fully applied, so a crash mid-run re-delivers the batch on the next
//! sync instead of silently skipping it. The registry's idempotent
//! upserts absorb the replay.

use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::ChangeCursor;

/// Counters accumulated over one sync run, persisted with the cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncCounters {
    pub items_seen: i64,
    pub created: i64,
    pub updated: i64,
    pub deleted: i64,
}

#[derive(Clone)]
pub struct CursorStore {
    pool: SqlitePool,
}

impl CursorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the cursor for a partition. `None` means the partition has
    /// never completed a sync and the next run does a full listing.
    pub async fn load(&self, partition_id: &str) -> Result<Option<ChangeCursor>> {
        let row = sqlx::query("SELECT * FROM cursors WHERE partition_id = ?")
            .bind(partition_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| ChangeCursor {
            partition_id: r.get("partition_id"),
            token: r.get("token"),
            last_sync_at: r.get("last_sync_at"),
            items_seen: r.get("items_seen"),
            created: r.get("created"),
            updated: r.get("updated"),
            deleted: r.get("deleted"),
            sync_count: r.get("sync_count"),
        }))
    }

    /// Persist the continuation token and run counters after a completed
    /// sync. `sync_count` increments atomically within the upsert.
    pub async fn save(
        &self,
        partition_id: &str,
        token: Option<&str>,
        counters: &SyncCounters,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO cursors (
                partition_id, token, last_sync_at,
                items_seen, created, updated, deleted, sync_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(partition_id) DO UPDATE SET
                token = excluded.token,
                last_sync_at = excluded.last_sync_at,
                items_seen = excluded.items_seen,
                created = excluded.created,
                updated = excluded.updated,
                deleted = excluded.deleted,
                sync_count = cursors.sync_count + 1
            "#,
        )
        .bind(partition_id)
        .bind(token)
        .bind(now)
        .bind(counters.items_seen)
        .bind(counters.created)
        .bind(counters.updated)
        .bind(counters.deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop a partition's token, forcing the next sync to do a full
    /// listing. Counters and sync history are kept.
    pub async fn reset(&self, partition_id: &str) -> Result<()> {
        sqlx::query("UPDATE cursors SET token = NULL WHERE partition_id = ?")
            .bind(partition_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<ChangeCursor>> {
        let rows = sqlx::query("SELECT * FROM cursors ORDER BY partition_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ChangeCursor {
                partition_id: r.get("partition_id"),
                token: r.get("token"),
                last_sync_at: r.get("last_sync_at"),
                items_seen: r.get("items_seen"),
                created: r.get("created"),
                updated: r.get("updated"),
                deleted: r.get("deleted"),
                sync_count: r.get("sync_count"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, CursorStore) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::connect(&tmp.path().join("cursors.sqlite"))
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        (tmp, CursorStore::new(pool))
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let (_tmp, store) = store().await;
        assert!(store.load("drive-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_and_reload() {
        let (_tmp, store) = store().await;
        let counters = SyncCounters {
            items_seen: 10,
            created: 3,
            updated: 2,
            deleted: 1,
        };
        store.save("drive-1", Some("token-abc"), &counters).await.unwrap();

        let cursor = store.load("drive-1").await.unwrap().unwrap();
        assert_eq!(cursor.token.as_deref(), Some("token-abc"));
        assert_eq!(cursor.items_seen, 10);
        assert_eq!(cursor.sync_count, 1);
    }

    #[tokio::test]
    async fn sync_count_increments_on_each_save() {
        let (_tmp, store) = store().await;
        let counters = SyncCounters::default();
        store.save("drive-1", Some("t1"), &counters).await.unwrap();
        store.save("drive-1", Some("t2"), &counters).await.unwrap();
        store.save("drive-1", Some("t3"), &counters).await.unwrap();

        let cursor = store.load("drive-1").await.unwrap().unwrap();
        assert_eq!(cursor.token.as_deref(), Some("t3"));
        assert_eq!(cursor.sync_count, 3);
    }

    #[tokio::test]
    async fn reset_clears_token_only() {
        let (_tmp, store) = store().await;
        let counters = SyncCounters {
            items_seen: 5,
            ..Default::default()
        };
        store.save("drive-1", Some("t1"), &counters).await.unwrap();
        store.reset("drive-1").await.unwrap();

        let cursor = store.load("drive-1").await.unwrap().unwrap();
        assert!(cursor.token.is_none());
        assert_eq!(cursor.items_seen, 5);
        assert_eq!(cursor.sync_count, 1);
    }
}
