//! End-to-end pipeline tests over in-memory capability fakes.
//!
//! These drive the real tracker, registry, router, twin builder, and
//! chunker against a scripted change source, an in-memory object store,
//! and a fake analysis service: the full ingestion flow minus the
//! network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use twindex::analysis::{AnalysisService, JobResult, JobStatus};
use twindex::chunker;
use twindex::config::SourceConfig;
use twindex::cursor::CursorStore;
use twindex::error::{Error, Result as PipelineResult};
use twindex::models::{
    ChangeRecord, DeletedItem, DocStatus, Page, RemoteItem, Table,
};
use twindex::registry::Registry;
use twindex::router::{CompletionOutcome, ExtractionRouter, RoutingOutcome};
use twindex::source::{ChangePage, ChangeSource};
use twindex::store::{MemoryObjectStore, ObjectStore};
use twindex::tracker::ChangeTracker;
use twindex::twin::Twin;

// ═══════════════════════════════════════════════════════════════════════
// Fakes
// ═══════════════════════════════════════════════════════════════════════

/// One scripted response for `list_changes`.
enum Scripted {
    Page {
        records: Vec<ChangeRecord>,
        next_token: Option<String>,
        has_more: bool,
    },
    Throttle,
}

/// Change source that serves a scripted sequence of pages and throttles.
#[derive(Default)]
struct FakeChangeSource {
    script: Mutex<Vec<Scripted>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeChangeSource {
    fn push_page(&self, records: Vec<ChangeRecord>, next_token: Option<&str>, has_more: bool) {
        self.script.lock().unwrap().push(Scripted::Page {
            records,
            next_token: next_token.map(String::from),
            has_more,
        });
    }

    fn push_throttle(&self) {
        self.script.lock().unwrap().push(Scripted::Throttle);
    }

    fn set_body(&self, item_id: &str, bytes: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(item_id.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ChangeSource for FakeChangeSource {
    async fn list_changes(&self, _partition: &str, _token: Option<&str>) -> PipelineResult<ChangePage> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(ChangePage {
                records: vec![],
                next_token: None,
                has_more: false,
            });
        }
        match script.remove(0) {
            Scripted::Page {
                records,
                next_token,
                has_more,
            } => Ok(ChangePage {
                records,
                next_token,
                has_more,
            }),
            Scripted::Throttle => Err(Error::TransientSource {
                message: "source returned HTTP 429".to_string(),
                retry_after: None,
            }),
        }
    }

    async fn download(&self, item: &RemoteItem) -> PipelineResult<Vec<u8>> {
        if let Some(bytes) = self.bodies.lock().unwrap().get(&item.id) {
            return Ok(bytes.clone());
        }
        Ok(format!("content of {}", item.path).into_bytes())
    }
}

/// Analysis service that assigns sequential job ids and serves scripted
/// results.
#[derive(Default)]
struct FakeAnalysis {
    counter: AtomicU32,
    submitted: Mutex<HashMap<String, String>>, // job id -> source key
    failures: Mutex<HashMap<String, String>>,  // job id -> failure reason
}

impl FakeAnalysis {
    fn fail_job(&self, job_id: &str, reason: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(job_id.to_string(), reason.to_string());
    }

    fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysis {
    async fn submit(&self, source_key: &str) -> PipelineResult<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let job_id = format!("J{}", n);
        self.submitted
            .lock()
            .unwrap()
            .insert(job_id.clone(), source_key.to_string());
        Ok(job_id)
    }

    async fn fetch(&self, job_id: &str) -> PipelineResult<JobResult> {
        let source_key = self
            .submitted
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::ExtractionService(format!("unknown job {}", job_id)))?;

        if let Some(reason) = self.failures.lock().unwrap().get(job_id) {
            return Ok(JobResult {
                job_id: job_id.to_string(),
                status: JobStatus::Failed(reason.clone()),
                source_key,
                pages: vec![],
                tables: vec![],
            });
        }

        Ok(JobResult {
            job_id: job_id.to_string(),
            status: JobStatus::Succeeded,
            source_key: source_key.clone(),
            pages: vec![
                Page {
                    page_number: 1,
                    text: format!("scanned text of {}", source_key),
                },
                Page {
                    page_number: 2,
                    text: "second page".to_string(),
                },
            ],
            tables: vec![Table {
                table_index: 1,
                page_number: Some(2),
                rows: vec![vec!["k".to_string(), "v".to_string()]],
            }],
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════════

struct Harness {
    _tmp: TempDir,
    registry: Registry,
    cursors: CursorStore,
    store: MemoryObjectStore,
    source: FakeChangeSource,
    analysis: FakeAnalysis,
    source_config: SourceConfig,
}

const PARTITION: &str = "hr-policies";

impl Harness {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = twindex::db::connect(&tmp.path().join("registry.sqlite"))
            .await
            .unwrap();
        twindex::migrate::run_migrations(&pool).await.unwrap();

        Self {
            _tmp: tmp,
            registry: Registry::new(pool.clone()),
            cursors: CursorStore::new(pool),
            store: MemoryObjectStore::new(),
            source: FakeChangeSource::default(),
            analysis: FakeAnalysis::default(),
            source_config: SourceConfig {
                base_url: "http://fake".to_string(),
                partitions: vec![PARTITION.to_string()],
                excluded_folders: vec!["Drafts".to_string(), "drafts".to_string()],
                max_retries: 1,
                base_delay_ms: 1,
                timeout_secs: 5,
            },
        }
    }

    fn tracker(&self) -> ChangeTracker<'_> {
        ChangeTracker::new(
            &self.source,
            &self.store,
            &self.registry,
            &self.cursors,
            &self.source_config,
            "source",
            "extracted",
        )
    }

    fn router(&self) -> ExtractionRouter<'_> {
        ExtractionRouter::new(
            &self.registry,
            &self.store,
            Some(&self.analysis),
            "source",
            "extracted",
        )
    }

    async fn load_twin(&self, twin_key: &str) -> Twin {
        let bytes = self.store.get(twin_key).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

fn upserted(id: &str, path: &str, version: &str) -> ChangeRecord {
    ChangeRecord::Upserted(RemoteItem {
        id: id.to_string(),
        name: path.rsplit('/').next().unwrap().to_string(),
        path: path.to_string(),
        version: version.to_string(),
        size: 0,
        download_url: None,
    })
}

fn deleted(id: &str, path: &str) -> ChangeRecord {
    ChangeRecord::Deleted(DeletedItem {
        id: id.to_string(),
        path: Some(path.to_string()),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario A: synchronous path end to end
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn txt_document_reaches_direct_extracted_in_one_call_chain() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("n1", "/notes/welcome.txt", "v1")], Some("t1"), false);

    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/notes/welcome.txt";
    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Pending);
    assert!(harness.store.get(key).await.is_ok());

    let outcome = harness.router().dispatch(key).await.unwrap();
    let RoutingOutcome::Extracted { twin_key } = outcome else {
        panic!("expected Extracted, got {:?}", outcome);
    };
    assert_eq!(twin_key, "extracted/hr-policies/notes/welcome.json");

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::DirectExtracted);
    assert_eq!(record.twin_key.as_deref(), Some(twin_key.as_str()));

    let twin = harness.load_twin(&twin_key).await;
    assert_eq!(twin.schema_version, "2.0");
    assert_eq!(twin.extraction_metadata.method, "txt");
    assert_eq!(twin.extracted_text, "content of /notes/welcome.txt");
    assert_eq!(twin.metadata.library, PARTITION);
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario B: stale completion discarded after version supersede
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn stale_job_completion_is_discarded_after_new_version() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("p1", "/scans/report.pdf", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/scans/report.pdf";
    let RoutingOutcome::Submitted { job_id: j1 } = harness.router().dispatch(key).await.unwrap()
    else {
        panic!("expected Submitted");
    };
    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Processing);
    assert_eq!(record.job_id.as_deref(), Some(j1.as_str()));

    // v2 arrives before J1 completes: reset to pending, job cleared.
    harness
        .source
        .push_page(vec![upserted("p1", "/scans/report.pdf", "v2")], Some("t2"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Pending);
    assert_eq!(record.content_version, "v2");
    assert!(record.job_id.is_none());

    // J1's completion finally arrives: must be discarded, not applied.
    let outcome = harness.router().complete(&j1).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::Discarded { .. }));

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Pending);
    assert!(record.twin_key.is_none());
    assert!(!harness
        .store
        .exists("extracted/hr-policies/scans/report.json")
        .await
        .unwrap());

    // Re-dispatching v2 completes normally.
    let RoutingOutcome::Submitted { job_id: j2 } = harness.router().dispatch(key).await.unwrap()
    else {
        panic!("expected Submitted");
    };
    let outcome = harness.router().complete(&j2).await.unwrap();
    let CompletionOutcome::Completed { twin_key } = outcome else {
        panic!("expected Completed, got {:?}", outcome);
    };

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Completed);

    let twin = harness.load_twin(&twin_key).await;
    assert_eq!(twin.extraction_metadata.method, "textract");
    assert_eq!(twin.extraction_metadata.job_id.as_deref(), Some(j2.as_str()));
    assert_eq!(twin.metadata.content_version, "v2");
}

#[tokio::test]
async fn duplicate_completion_is_a_noop_after_terminal_state() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("p2", "/scans/audit.pdf", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/scans/audit.pdf";
    let RoutingOutcome::Submitted { job_id } = harness.router().dispatch(key).await.unwrap()
    else {
        panic!("expected Submitted");
    };

    let first = harness.router().complete(&job_id).await.unwrap();
    assert!(matches!(first, CompletionOutcome::Completed { .. }));
    let updated_at = harness
        .registry
        .get(key)
        .await
        .unwrap()
        .unwrap()
        .updated_at;

    // Duplicate notification for the same job id.
    let second = harness.router().complete(&job_id).await.unwrap();
    assert!(matches!(second, CompletionOutcome::Discarded { .. }));
    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Completed);
    assert_eq!(record.updated_at, updated_at);
}

#[tokio::test]
async fn failed_analysis_job_marks_failed() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("p3", "/scans/locked.pdf", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/scans/locked.pdf";
    let RoutingOutcome::Submitted { job_id } = harness.router().dispatch(key).await.unwrap()
    else {
        panic!("expected Submitted");
    };
    harness.analysis.fail_job(&job_id, "document is password protected");

    let outcome = harness.router().complete(&job_id).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::Failed { .. }));

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Failed);
    assert!(record.error.unwrap().contains("password protected"));

    // Explicit retry re-enters processing.
    let retried = harness.router().dispatch(key).await.unwrap();
    assert!(matches!(retried, RoutingOutcome::Submitted { .. }));
    assert_eq!(
        harness.registry.get(key).await.unwrap().unwrap().status,
        DocStatus::Processing
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario C: legacy format fails, never produces a twin
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn legacy_doc_is_marked_failed_and_never_produces_a_twin() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("d1", "/old/contract.doc", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/old/contract.doc";
    let outcome = harness.router().dispatch(key).await.unwrap();
    let RoutingOutcome::Failed { reason } = outcome else {
        panic!("expected Failed, got {:?}", outcome);
    };
    assert!(reason.contains("unsupported format"));

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Failed);
    assert!(record.error.unwrap().contains("unsupported format"));
    assert!(record.twin_key.is_none());
    assert!(!harness
        .store
        .exists("extracted/hr-policies/old/contract.json")
        .await
        .unwrap());
    // The analysis service was never involved.
    assert_eq!(harness.analysis.submitted_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario D: transient failure leaves the cursor untouched
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn transient_failure_mid_batch_leaves_cursor_and_rerun_redelivers() {
    let harness = Harness::new().await;

    let first_three: Vec<ChangeRecord> = (1..=3)
        .map(|i| upserted(&format!("i{}", i), &format!("/bulk/doc{}.txt", i), "v1"))
        .collect();
    let last_seven: Vec<ChangeRecord> = (4..=10)
        .map(|i| upserted(&format!("i{}", i), &format!("/bulk/doc{}.txt", i), "v1"))
        .collect();

    // First run: page one lands, page two throttles until retries run out.
    harness.source.push_page(first_three.clone(), Some("mid"), true);
    harness.source.push_throttle();
    harness.source.push_throttle();

    let err = harness.tracker().sync(PARTITION).await.unwrap_err();
    assert!(err.is_transient());

    // The first three were applied, but the cursor must not have moved.
    assert_eq!(
        harness.registry.by_partition(PARTITION).await.unwrap().len(),
        3
    );
    assert!(harness.cursors.load(PARTITION).await.unwrap().is_none());

    // Second run: the source redelivers the full batch.
    let mut all_ten = first_three;
    all_ten.extend(last_seven);
    harness.source.push_page(all_ten, Some("done"), false);

    let report = harness.tracker().sync(PARTITION).await.unwrap();
    assert_eq!(report.items_seen, 10);
    // The replayed three are absorbed by idempotent upserts.
    assert_eq!(report.created, 7);
    assert_eq!(report.unchanged, 3);

    let cursor = harness.cursors.load(PARTITION).await.unwrap().unwrap();
    assert_eq!(cursor.token.as_deref(), Some("done"));
    assert_eq!(
        harness.registry.by_partition(PARTITION).await.unwrap().len(),
        10
    );
}

#[tokio::test]
async fn unchanged_versions_are_skipped_without_download() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("n1", "/a.txt", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    // Same item, same version, replayed on the next delta.
    harness
        .source
        .push_page(vec![upserted("n1", "/a.txt", "v1")], Some("t2"), false);
    let report = harness.tracker().sync(PARTITION).await.unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.created + report.updated, 0);

    // Cursor still advances with the applied batch.
    let cursor = harness.cursors.load(PARTITION).await.unwrap().unwrap();
    assert_eq!(cursor.token.as_deref(), Some("t2"));
}

// ═══════════════════════════════════════════════════════════════════════
// Exclusions and deletions
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn excluded_folders_are_silently_dropped() {
    let harness = Harness::new().await;
    harness.source.push_page(
        vec![
            upserted("k1", "/Drafts/wip.txt", "v1"),
            upserted("k2", "/Final/done.txt", "v1"),
        ],
        Some("t1"),
        false,
    );

    let report = harness.tracker().sync(PARTITION).await.unwrap();
    assert_eq!(report.excluded, 1);
    assert_eq!(report.created, 1);

    assert!(harness
        .registry
        .get("source/hr-policies/Drafts/wip.txt")
        .await
        .unwrap()
        .is_none());
    assert!(!harness
        .store
        .exists("source/hr-policies/Drafts/wip.txt")
        .await
        .unwrap());
}

#[tokio::test]
async fn deletion_removes_object_twin_and_record() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("n1", "/notes/old.txt", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/notes/old.txt";
    harness.router().dispatch(key).await.unwrap();
    let twin_key = "extracted/hr-policies/notes/old.json";
    assert!(harness.store.exists(twin_key).await.unwrap());

    harness
        .source
        .push_page(vec![deleted("n1", "/notes/old.txt")], Some("t2"), false);
    let report = harness.tracker().sync(PARTITION).await.unwrap();
    assert_eq!(report.deleted, 1);

    assert!(harness.registry.get(key).await.unwrap().is_none());
    assert!(!harness.store.exists(key).await.unwrap());
    assert!(!harness.store.exists(twin_key).await.unwrap());
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_dispatch_has_exactly_one_winner() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("n1", "/race.txt", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/race.txt";
    let router_a = harness.router();
    let router_b = harness.router();
    let (a, b) = tokio::join!(router_a.dispatch(key), router_b.dispatch(key));
    let (a, b) = (a.unwrap(), b.unwrap());

    let extracted = [&a, &b]
        .iter()
        .filter(|o| matches!(o, RoutingOutcome::Extracted { .. }))
        .count();
    let skipped = [&a, &b]
        .iter()
        .filter(|o| matches!(o, RoutingOutcome::Skipped { .. }))
        .count();
    assert_eq!(extracted, 1, "exactly one dispatch wins: {:?} / {:?}", a, b);
    assert_eq!(skipped, 1);

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::DirectExtracted);
}

// ═══════════════════════════════════════════════════════════════════════
// Office formats through the full pipeline
// ═══════════════════════════════════════════════════════════════════════

fn minimal_docx(phrase: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn docx_goes_through_the_sync_path() {
    let harness = Harness::new().await;
    harness
        .source
        .set_body("w1", &minimal_docx("quarterly results summary"));
    harness
        .source
        .push_page(vec![upserted("w1", "/reports/q3.docx", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/reports/q3.docx";
    let outcome = harness.router().dispatch(key).await.unwrap();
    let RoutingOutcome::Extracted { twin_key } = outcome else {
        panic!("expected Extracted, got {:?}", outcome);
    };

    let twin = harness.load_twin(&twin_key).await;
    assert_eq!(twin.extraction_metadata.method, "docx");
    assert_eq!(twin.extracted_text, "quarterly results summary");
    assert_eq!(
        harness.registry.get(key).await.unwrap().unwrap().status,
        DocStatus::DirectExtracted
    );
    // Source identity tags carried onto the twin object.
    let tags = harness.store.tags(&twin_key).unwrap();
    assert_eq!(tags["partition"], PARTITION);
    assert_eq!(tags["twin-type"], "extracted-json");
}

#[tokio::test]
async fn corrupt_docx_is_marked_failed_with_reason() {
    let harness = Harness::new().await;
    harness.source.set_body("w2", b"this is not a zip archive");
    harness
        .source
        .push_page(vec![upserted("w2", "/reports/broken.docx", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/reports/broken.docx";
    let outcome = harness.router().dispatch(key).await.unwrap();
    assert!(matches!(outcome, RoutingOutcome::Failed { .. }));

    let record = harness.registry.get(key).await.unwrap().unwrap();
    assert_eq!(record.status, DocStatus::Failed);
    assert!(record.error.unwrap().contains("extraction failed"));
}

// ═══════════════════════════════════════════════════════════════════════
// Twin → chunks
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn completed_twin_chunks_deterministically() {
    let harness = Harness::new().await;
    harness
        .source
        .push_page(vec![upserted("p9", "/scans/long.pdf", "v1")], Some("t1"), false);
    harness.tracker().sync(PARTITION).await.unwrap();

    let key = "source/hr-policies/scans/long.pdf";
    let RoutingOutcome::Submitted { job_id } = harness.router().dispatch(key).await.unwrap()
    else {
        panic!("expected Submitted");
    };
    let CompletionOutcome::Completed { twin_key } =
        harness.router().complete(&job_id).await.unwrap()
    else {
        panic!("expected Completed");
    };

    let twin = harness.load_twin(&twin_key).await;
    let a = chunker::chunk_twin(&twin, 512, 50).unwrap();
    let b = chunker::chunk_twin(&twin, 512, 50).unwrap();
    assert_eq!(a, b);
    assert!(!a.is_empty());

    // The analysis result's table rides along as its own chunk.
    let table_chunk = a.last().unwrap();
    assert_eq!(table_chunk.text, r#"[["k","v"]]"#);
    assert_eq!(table_chunk.metadata.page_numbers, vec![2]);

    for chunk in &a {
        assert_eq!(chunk.metadata.library, PARTITION);
        assert_eq!(chunk.document_id, twin.document_id);
        assert_eq!(chunk.total_chunks, a.len());
    }
}
