use anyhow::Result;
use sqlx::SqlitePool;

/// Create the registry schema. Idempotent — safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Document registry: one row per storage key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            storage_key TEXT PRIMARY KEY,
            remote_id TEXT NOT NULL,
            content_version TEXT NOT NULL,
            remote_path TEXT NOT NULL,
            partition_id TEXT NOT NULL,
            file_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            job_id TEXT,
            twin_key TEXT,
            error TEXT,
            ingested_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Incremental-sync cursors: one row per source partition
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cursors (
            partition_id TEXT PRIMARY KEY,
            token TEXT,
            last_sync_at INTEGER,
            items_seen INTEGER NOT NULL DEFAULT 0,
            created INTEGER NOT NULL DEFAULT 0,
            updated INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            sync_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Secondary-attribute lookups used by dispatch, retry, and stats
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_partition ON documents(partition_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_job_id ON documents(job_id)")
        .execute(pool)
        .await?;

    Ok(())
}
