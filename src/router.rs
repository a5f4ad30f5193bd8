//! File-type-aware extraction routing.
//!
//! `dispatch` decides, per declared type, between the asynchronous
//! heavy-analysis path (submit job, record id, return) and the
//! synchronous in-process path (extract, build twin, finish, all in one
//! call chain). `complete` is the independently invocable second phase
//! of the async path; all state between the two phases lives in the
//! registry, none in memory.
//!
//! Both entry points are safe to invoke redundantly: the registry's
//! conditional writes turn duplicate notifications, replays, and stale
//! completions into no-ops. `dispatch` is also the re-dispatch hook for
//! reconciliation; notification delivery is best-effort and must never
//! be the only trigger path.

use tracing::{info, warn};

use crate::analysis::{AnalysisService, JobStatus};
use crate::error::{Error, Result};
use crate::extract;
use crate::models::{DocStatus, DocumentRecord, ExtractionMethod, ExtractionOutcome, FileKind};
use crate::registry::Registry;
use crate::store::ObjectStore;
use crate::twin::TwinBuilder;

/// What `dispatch` did for a storage key.
#[derive(Debug, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// Async path: job submitted, completion arrives later.
    Submitted { job_id: String },
    /// Sync path: twin written in this call chain.
    Extracted { twin_key: String },
    /// Terminal failure recorded in the registry.
    Failed { reason: String },
    /// Nothing to do (no record, or a concurrent handler won the race).
    Skipped { reason: String },
}

/// What `complete` did for a job id.
#[derive(Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed { twin_key: String },
    Failed { reason: String },
    /// Stale or duplicate callback; no writes performed.
    Discarded { reason: String },
}

pub struct ExtractionRouter<'a> {
    registry: &'a Registry,
    store: &'a dyn ObjectStore,
    analysis: Option<&'a dyn AnalysisService>,
    source_prefix: &'a str,
    twin_prefix: &'a str,
}

impl<'a> ExtractionRouter<'a> {
    pub fn new(
        registry: &'a Registry,
        store: &'a dyn ObjectStore,
        analysis: Option<&'a dyn AnalysisService>,
        source_prefix: &'a str,
        twin_prefix: &'a str,
    ) -> Self {
        Self {
            registry,
            store,
            analysis,
            source_prefix,
            twin_prefix,
        }
    }

    fn twin_builder(&self) -> TwinBuilder<'a> {
        TwinBuilder::new(
            self.store,
            self.registry,
            self.source_prefix,
            self.twin_prefix,
        )
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Route a stored document into its extraction path.
    pub async fn dispatch(&self, storage_key: &str) -> Result<RoutingOutcome> {
        let Some(record) = self.registry.get(storage_key).await? else {
            warn!(key = %storage_key, "dispatch for unregistered key");
            return Ok(RoutingOutcome::Skipped {
                reason: "no registry record".to_string(),
            });
        };
        if record.status == DocStatus::Processing || record.status.is_terminal() {
            // Duplicate notification, or an operator re-dispatching a key
            // that is already done; `retry` clears `failed` first.
            if record.status != DocStatus::Failed {
                return Ok(RoutingOutcome::Skipped {
                    reason: format!("record is {}", record.status),
                });
            }
        }

        match FileKind::from_extension(&record.file_type) {
            FileKind::Pdf => self.dispatch_analysis(&record).await,
            kind @ (FileKind::Docx | FileKind::Pptx | FileKind::Xlsx | FileKind::Txt) => {
                self.dispatch_sync(&record, kind).await
            }
            FileKind::LegacyDoc | FileKind::LegacyPpt | FileKind::LegacyXls => {
                let reason = format!(
                    "unsupported format: {} (no conversion capability configured)",
                    record.file_type
                );
                self.fail(&record.storage_key, &reason).await?;
                Ok(RoutingOutcome::Failed { reason })
            }
            FileKind::Unknown => {
                let reason = format!("unsupported format: '{}'", record.file_type);
                self.fail(&record.storage_key, &reason).await?;
                Ok(RoutingOutcome::Failed { reason })
            }
        }
    }

    /// Async path: submit first, then take the `processing` transition
    /// with the job id recorded. Losing the transition leaves an orphan
    /// job whose completion will be discarded by the job-id check.
    async fn dispatch_analysis(&self, record: &DocumentRecord) -> Result<RoutingOutcome> {
        let Some(analysis) = self.analysis else {
            return Err(Error::ExtractionService(
                "heavy-analysis capability is not configured".to_string(),
            ));
        };

        let job_id = analysis.submit(&record.storage_key).await?;
        let won = self
            .registry
            .mark_processing(&record.storage_key, Some(&job_id))
            .await?;
        if !won {
            warn!(key = %record.storage_key, %job_id, "lost processing race, orphan job will be discarded");
            return Ok(RoutingOutcome::Skipped {
                reason: "concurrent handler won the processing transition".to_string(),
            });
        }

        info!(key = %record.storage_key, %job_id, "analysis job submitted");
        Ok(RoutingOutcome::Submitted { job_id })
    }

    /// Sync path: win the `processing` transition, extract in-process,
    /// and finish the twin in the same call chain.
    async fn dispatch_sync(
        &self,
        record: &DocumentRecord,
        kind: FileKind,
    ) -> Result<RoutingOutcome> {
        let won = self
            .registry
            .mark_processing(&record.storage_key, None)
            .await?;
        if !won {
            return Ok(RoutingOutcome::Skipped {
                reason: "concurrent handler won the processing transition".to_string(),
            });
        }

        // Re-read after winning the transition: a newer version may have
        // landed between the status check and the conditional write, and
        // the twin must describe the content that is actually stored.
        let Some(record) = self.registry.get(&record.storage_key).await? else {
            return Ok(RoutingOutcome::Skipped {
                reason: "record deleted mid-dispatch".to_string(),
            });
        };
        let record = &record;

        let bytes = match self.store.get(&record.storage_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = format!("raw object unreadable: {}", e);
                self.registry.mark_failed(&record.storage_key, &reason).await?;
                return Ok(RoutingOutcome::Failed { reason });
            }
        };

        let outcome = match extract::extract(&bytes, kind) {
            Ok(outcome) => outcome,
            Err(e @ (Error::UnsupportedFormat(_) | Error::ExtractionService(_))) => {
                let reason = e.to_string();
                self.registry.mark_failed(&record.storage_key, &reason).await?;
                return Ok(RoutingOutcome::Failed { reason });
            }
            Err(e) => return Err(e),
        };

        match self.twin_builder().build_and_store(record, &outcome).await? {
            Some(twin_key) => Ok(RoutingOutcome::Extracted { twin_key }),
            None => Ok(RoutingOutcome::Skipped {
                reason: "superseded during twin write".to_string(),
            }),
        }
    }

    /// Record a routing failure. Losing the conditional write here means
    /// the record moved on concurrently; fine either way.
    async fn fail(&self, storage_key: &str, reason: &str) -> Result<()> {
        if !self.registry.mark_failed(storage_key, reason).await? {
            warn!(key = %storage_key, "failure superseded by concurrent transition");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Completion (async path, phase two)
    // ------------------------------------------------------------------

    /// Handle a completion signal for an analysis job.
    ///
    /// Idempotent and stale-safe: the registry record must still be
    /// `processing` with this exact job id, otherwise the callback is
    /// discarded without side effects. That covers duplicate
    /// notifications, records deleted mid-flight, and jobs superseded by
    /// a newer content version.
    pub async fn complete(&self, job_id: &str) -> Result<CompletionOutcome> {
        let Some(analysis) = self.analysis else {
            return Err(Error::ExtractionService(
                "heavy-analysis capability is not configured".to_string(),
            ));
        };

        let result = analysis.fetch(job_id).await?;

        let Some(record) = self.registry.get(&result.source_key).await? else {
            info!(%job_id, key = %result.source_key, "completion for deleted record, discarding");
            return Ok(CompletionOutcome::Discarded {
                reason: "record no longer exists".to_string(),
            });
        };
        if record.status != DocStatus::Processing || record.job_id.as_deref() != Some(job_id) {
            info!(
                %job_id,
                key = %record.storage_key,
                status = %record.status,
                current_job = record.job_id.as_deref().unwrap_or("-"),
                "stale or duplicate completion, discarding"
            );
            return Ok(CompletionOutcome::Discarded {
                reason: "record is not processing this job".to_string(),
            });
        }

        match result.status {
            JobStatus::Failed(reason) => {
                let reason = format!("extraction failed: {}", reason);
                self.registry.mark_failed(&record.storage_key, &reason).await?;
                Ok(CompletionOutcome::Failed { reason })
            }
            JobStatus::Succeeded => {
                let outcome = ExtractionOutcome {
                    pages: result.pages,
                    tables: result.tables,
                    method: ExtractionMethod::Textract,
                    job_id: Some(job_id.to_string()),
                };
                match self.twin_builder().build_and_store(&record, &outcome).await? {
                    Some(twin_key) => Ok(CompletionOutcome::Completed { twin_key }),
                    None => Ok(CompletionOutcome::Discarded {
                        reason: "superseded during twin write".to_string(),
                    }),
                }
            }
        }
    }
}
