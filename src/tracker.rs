//! Incremental change tracking against the remote source.
//!
//! One sync run per partition: pull the change feed (full listing when
//! no cursor token is stored, delta otherwise), apply every record to
//! the object store and registry, and only then persist the new
//! continuation token. A run that dies mid-batch leaves the token
//! untouched, so the next run re-delivers the same records and the
//! registry's idempotent upserts absorb the replay. Delivery is
//! at-least-once by construction.

use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::cursor::{CursorStore, SyncCounters};
use crate::error::{Error, Result};
use crate::models::{ChangeRecord, DeletedItem, NewDocument, RemoteItem};
use crate::paths;
use crate::registry::{Registry, UpsertOutcome};
use crate::source::ChangeSource;
use crate::store::ObjectStore;

/// Outcome of one sync run over one partition.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub items_seen: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub excluded: u64,
    pub errors: u64,
}

pub struct ChangeTracker<'a> {
    source: &'a dyn ChangeSource,
    store: &'a dyn ObjectStore,
    registry: &'a Registry,
    cursors: &'a CursorStore,
    config: &'a SourceConfig,
    source_prefix: &'a str,
    twin_prefix: &'a str,
}

impl<'a> ChangeTracker<'a> {
    pub fn new(
        source: &'a dyn ChangeSource,
        store: &'a dyn ObjectStore,
        registry: &'a Registry,
        cursors: &'a CursorStore,
        config: &'a SourceConfig,
        source_prefix: &'a str,
        twin_prefix: &'a str,
    ) -> Self {
        Self {
            source,
            store,
            registry,
            cursors,
            config,
            source_prefix,
            twin_prefix,
        }
    }

    /// Sync one partition. Transient source errors retry with bounded
    /// backoff; any other error aborts the run with the stored cursor
    /// unchanged.
    pub async fn sync(&self, partition: &str) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", %partition, %run_id);
        self.sync_inner(partition).instrument(span).await
    }

    async fn sync_inner(&self, partition: &str) -> Result<SyncReport> {
        let cursor = self.cursors.load(partition).await?;
        let mut token = cursor.as_ref().and_then(|c| c.token.clone());
        match &token {
            Some(_) => info!("delta sync from stored token"),
            None => info!("no stored token, full listing"),
        }

        let mut report = SyncReport::default();

        loop {
            let page = self
                .with_backoff(|| self.source.list_changes(partition, token.as_deref()))
                .await?;

            for record in &page.records {
                report.items_seen += 1;
                match record {
                    ChangeRecord::Upserted(item) => {
                        self.apply_upsert(partition, item, &mut report).await?
                    }
                    ChangeRecord::Deleted(item) => {
                        self.apply_delete(partition, item, &mut report).await?
                    }
                }
            }

            token = page.next_token;
            if !page.has_more {
                break;
            }
        }

        // The whole batch is applied; only now may the cursor advance.
        let counters = SyncCounters {
            items_seen: report.items_seen as i64,
            created: report.created as i64,
            updated: report.updated as i64,
            deleted: report.deleted as i64,
        };
        self.cursors
            .save(partition, token.as_deref(), &counters)
            .await?;

        info!(
            seen = report.items_seen,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            excluded = report.excluded,
            "sync complete"
        );
        Ok(report)
    }

    async fn apply_upsert(
        &self,
        partition: &str,
        item: &RemoteItem,
        report: &mut SyncReport,
    ) -> Result<()> {
        // Excluded folders are dropped silently, before any side effect.
        if self
            .config
            .excluded_folders
            .iter()
            .any(|excluded| item.path.contains(excluded.as_str()))
        {
            report.excluded += 1;
            return Ok(());
        }

        let storage_key = paths::source_key(self.source_prefix, partition, &item.path);

        // Unchanged version: skip before downloading anything.
        if let Some(existing) = self.registry.get(&storage_key).await? {
            if existing.content_version == item.version {
                report.unchanged += 1;
                return Ok(());
            }
        }

        let bytes = self.with_backoff(|| self.source.download(item)).await?;
        let tags = paths::source_tags(partition, item);
        self.store.put(&storage_key, &bytes, &tags).await?;

        let doc = NewDocument {
            storage_key: storage_key.clone(),
            remote_id: item.id.clone(),
            content_version: item.version.clone(),
            remote_path: item.path.clone(),
            partition_id: partition.to_string(),
            file_type: paths::file_extension(&item.name),
            size_bytes: if item.size > 0 {
                item.size
            } else {
                bytes.len() as i64
            },
        };
        match self.registry.upsert(&doc).await? {
            UpsertOutcome::Created => report.created += 1,
            UpsertOutcome::Updated => report.updated += 1,
            // A concurrent run applied the same record first.
            UpsertOutcome::Unchanged => report.unchanged += 1,
        }
        Ok(())
    }

    async fn apply_delete(
        &self,
        partition: &str,
        item: &DeletedItem,
        report: &mut SyncReport,
    ) -> Result<()> {
        let Some(path) = item.path.as_deref() else {
            warn!(remote_id = %item.id, "deletion without a path, cannot resolve storage key");
            report.errors += 1;
            return Ok(());
        };

        let storage_key = paths::source_key(self.source_prefix, partition, path);
        let twin_key = paths::twin_key(self.source_prefix, self.twin_prefix, &storage_key);

        self.store.delete(&storage_key).await?;
        self.store.delete(&twin_key).await?;
        self.registry.delete(&storage_key).await?;
        report.deleted += 1;
        Ok(())
    }

    /// Run an operation, retrying transient failures with exponential
    /// backoff (honoring a `Retry-After` hint when the source sent one).
    /// Non-transient errors propagate immediately.
    async fn with_backoff<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = match &last_err {
                    Some(Error::TransientSource {
                        retry_after: Some(hint),
                        ..
                    }) => *hint,
                    _ => {
                        // 1x, 2x, 4x, ... the base delay, capped at 2^5.
                        let exp = (attempt - 1).min(5);
                        Duration::from_millis(self.config.base_delay_ms << exp)
                    }
                };
                warn!(
                    attempt,
                    max = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "throttled by source, backing off"
                );
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("retry loop exits with an error recorded"))
    }
}
