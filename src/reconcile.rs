//! Storage-vs-registry reconciliation.
//!
//! Storage-level notifications are best-effort and can be dropped under
//! load, so the raw object set, the twin set, and the registry drift
//! apart in known ways. Reconciliation surfaces the drift classes and
//! can force redelivery through the router's explicit dispatch entry:
//!
//! * raw objects with no registry record at all — a defect class
//!   distinct from `failed`, invisible to status queries;
//! * registered documents stuck short of a twin (`pending`, or a
//!   terminal success whose twin object is missing);
//! * orphan twins whose source object is gone.

use tracing::warn;

use crate::error::Result;
use crate::models::DocStatus;
use crate::paths;
use crate::registry::Registry;
use crate::router::ExtractionRouter;
use crate::store::ObjectStore;

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub raw_objects: usize,
    pub twin_objects: usize,
    /// Raw objects that never entered the registry.
    pub unregistered: Vec<String>,
    /// Registered documents with no usable twin.
    pub missing_twin: Vec<String>,
    /// Twin objects whose source object no longer exists.
    pub orphan_twins: Vec<String>,
    /// Keys re-dispatched this run.
    pub redispatched: usize,
}

pub async fn reconcile(
    store: &dyn ObjectStore,
    registry: &Registry,
    router: &ExtractionRouter<'_>,
    source_prefix: &str,
    twin_prefix: &str,
    redispatch: bool,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let raw_keys = store.list(&format!("{}/", source_prefix)).await?;
    let twin_keys = store.list(&format!("{}/", twin_prefix)).await?;
    report.raw_objects = raw_keys.len();
    report.twin_objects = twin_keys.len();

    for key in &raw_keys {
        match registry.get(key).await? {
            None => report.unregistered.push(key.clone()),
            Some(record) => {
                let stuck = match record.status {
                    DocStatus::Pending => true,
                    DocStatus::Completed | DocStatus::DirectExtracted => {
                        // Terminal success whose twin object vanished.
                        let twin_key = paths::twin_key(source_prefix, twin_prefix, key);
                        !store.exists(&twin_key).await?
                    }
                    // `processing` may legitimately be waiting on a job;
                    // `failed` is visible through status queries already.
                    DocStatus::Processing | DocStatus::Failed => false,
                };
                if stuck {
                    report.missing_twin.push(key.clone());
                }
            }
        }
    }

    for twin in &twin_keys {
        // Reverse the prefix swap: the twin's source may have any
        // extension, so compare against the registry by twin key.
        let known = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE twin_key = ?",
        )
        .bind(twin)
        .fetch_one(registry.pool())
        .await?;
        if known == 0 {
            report.orphan_twins.push(twin.clone());
        }
    }

    if redispatch {
        for key in report.missing_twin.clone() {
            match router.dispatch(&key).await {
                Ok(_) => report.redispatched += 1,
                Err(e) => warn!(key = %key, error = %e, "re-dispatch failed"),
            }
        }
    }

    Ok(report)
}
