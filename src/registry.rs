//! Document registry: the authoritative lifecycle store.
//!
//! One row per storage key, moving through
//! `pending → processing → completed | direct_extracted | failed`.
//! Every mutation states its precondition in the SQL `WHERE` clause, so
//! two handlers racing on the same key can never both win a transition;
//! the loser's statement simply matches zero rows.
//!
//! Deduplication is by content version: re-upserting an unchanged version
//! is a no-op, while a new version fully resets the record to `pending`
//! and clears any extraction state from the previous version.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::Result;
use crate::models::{DocStatus, DocumentRecord, ExtractionMethod, NewDocument};

/// What an upsert did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; created at `pending`.
    Created,
    /// Version changed; record reset to `pending` with extraction state
    /// cleared.
    Updated,
    /// Version unchanged; nothing written.
    Unchanged,
}

/// Aggregated registry counts for the `stats` command.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub total: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_type: Vec<(String, i64)>,
    pub by_partition: Vec<(String, i64)>,
}

#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Upsert a document observed by the change tracker.
    ///
    /// The version comparison happens inside the conflict clause, so a
    /// replayed change record for the stored version matches zero rows
    /// and leaves the record (including a terminal status) untouched.
    pub async fn upsert(&self, doc: &NewDocument) -> Result<UpsertOutcome> {
        let now = chrono::Utc::now().timestamp();

        let existed: Option<String> =
            sqlx::query_scalar("SELECT content_version FROM documents WHERE storage_key = ?")
                .bind(&doc.storage_key)
                .fetch_optional(&self.pool)
                .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                storage_key, remote_id, content_version, remote_path, partition_id,
                file_type, size_bytes, status, job_id, twin_key, error,
                ingested_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', NULL, NULL, NULL, ?, ?)
            ON CONFLICT(storage_key) DO UPDATE SET
                remote_id = excluded.remote_id,
                content_version = excluded.content_version,
                remote_path = excluded.remote_path,
                partition_id = excluded.partition_id,
                file_type = excluded.file_type,
                size_bytes = excluded.size_bytes,
                status = 'pending',
                job_id = NULL,
                twin_key = NULL,
                error = NULL,
                updated_at = excluded.updated_at
            WHERE documents.content_version <> excluded.content_version
            "#,
        )
        .bind(&doc.storage_key)
        .bind(&doc.remote_id)
        .bind(&doc.content_version)
        .bind(&doc.remote_path)
        .bind(&doc.partition_id)
        .bind(&doc.file_type)
        .bind(doc.size_bytes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let outcome = if result.rows_affected() == 0 {
            UpsertOutcome::Unchanged
        } else if existed.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        debug!(key = %doc.storage_key, version = %doc.content_version, ?outcome, "upsert");
        Ok(outcome)
    }

    /// Transition to `processing`, recording the analysis job id when the
    /// heavy path is taken.
    ///
    /// Allowed from `pending` (first dispatch) and `failed` (explicit
    /// retry, the only way out of a terminal state short of a new
    /// content version). Returns `false` when a concurrent writer won
    /// the transition; the caller must then back off without side
    /// effects.
    pub async fn mark_processing(&self, storage_key: &str, job_id: Option<&str>) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'processing', job_id = ?, error = NULL, updated_at = ?
            WHERE storage_key = ? AND status IN ('pending', 'failed')
            "#,
        )
        .bind(job_id)
        .bind(now)
        .bind(storage_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a finished extraction: twin written, terminal status set.
    ///
    /// Conditioned on `processing`, which is what makes duplicate
    /// completion callbacks and callbacks for superseded versions
    /// harmless; by then the record is no longer `processing`.
    pub async fn mark_complete(
        &self,
        storage_key: &str,
        twin_key: &str,
        method: ExtractionMethod,
    ) -> Result<bool> {
        let terminal = match method {
            ExtractionMethod::Textract => DocStatus::Completed,
            _ => DocStatus::DirectExtracted,
        };
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = ?, twin_key = ?, updated_at = ?
            WHERE storage_key = ? AND status = 'processing'
            "#,
        )
        .bind(terminal.as_str())
        .bind(twin_key)
        .bind(now)
        .bind(storage_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a failed extraction with its reason.
    ///
    /// Allowed from `pending` (routing rejected the format before any
    /// work started) and `processing` (the attempt itself failed).
    pub async fn mark_failed(&self, storage_key: &str, reason: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'failed', error = ?, updated_at = ?
            WHERE storage_key = ? AND status IN ('pending', 'processing')
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(storage_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove a record after the source reported the backing item gone.
    /// Deleting a `processing` record is fine; its eventual completion
    /// callback finds nothing and is discarded.
    pub async fn delete(&self, storage_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE storage_key = ?")
            .bind(storage_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub async fn get(&self, storage_key: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT * FROM documents WHERE storage_key = ?")
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(record_from_row).transpose()
    }

    pub async fn by_status(&self, status: DocStatus) -> Result<Vec<DocumentRecord>> {
        let rows =
            sqlx::query("SELECT * FROM documents WHERE status = ? ORDER BY ingested_at, storage_key")
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(record_from_row).collect()
    }

    pub async fn by_partition(&self, partition_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE partition_id = ? ORDER BY ingested_at, storage_key",
        )
        .bind(partition_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(record_from_row).collect()
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> Result<RegistryStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        Ok(RegistryStats {
            total,
            by_status: self.group_counts("status").await?,
            by_type: self.group_counts("file_type").await?,
            by_partition: self.group_counts("partition_id").await?,
        })
    }

    async fn group_counts(&self, column: &str) -> Result<Vec<(String, i64)>> {
        // `column` is one of three fixed identifiers above, never user input.
        let sql = format!(
            "SELECT {col} AS k, COUNT(*) AS n FROM documents GROUP BY {col} ORDER BY n DESC, k",
            col = column
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("k"), r.get::<i64, _>("n")))
            .collect())
    }
}

pub(crate) fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<DocumentRecord> {
    let status_raw: String = row.get("status");
    let status = DocStatus::parse(&status_raw).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown document status '{}'", status_raw).into())
    })?;
    Ok(DocumentRecord {
        storage_key: row.get("storage_key"),
        remote_id: row.get("remote_id"),
        content_version: row.get("content_version"),
        remote_path: row.get("remote_path"),
        partition_id: row.get("partition_id"),
        file_type: row.get("file_type"),
        size_bytes: row.get("size_bytes"),
        status,
        job_id: row.get("job_id"),
        twin_key: row.get("twin_key"),
        error: row.get("error"),
        ingested_at: row.get("ingested_at"),
        updated_at: row.get("updated_at"),
    })
}
