//! Core data models for the ingestion pipeline.
//!
//! These types flow between the change tracker, document registry,
//! extraction router, and twin builder.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered document.
///
/// Stored as a lowercase string in the registry; the string values are
/// part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    /// Raw bytes stored, extraction not yet dispatched.
    Pending,
    /// Extraction in flight (async job submitted or sync path running).
    Processing,
    /// Twin produced by the heavy-analysis path.
    Completed,
    /// Twin produced by a synchronous in-process extractor.
    DirectExtracted,
    /// Extraction failed; record kept visible with its reason.
    Failed,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Pending => "pending",
            DocStatus::Processing => "processing",
            DocStatus::Completed => "completed",
            DocStatus::DirectExtracted => "direct_extracted",
            DocStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocStatus::Pending),
            "processing" => Some(DocStatus::Processing),
            "completed" => Some(DocStatus::Completed),
            "direct_extracted" => Some(DocStatus::DirectExtracted),
            "failed" => Some(DocStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states: only an explicit retry (`failed`) or a new content
    /// version leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocStatus::Completed | DocStatus::DirectExtracted | DocStatus::Failed
        )
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row in the document registry, keyed by storage key.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Primary identity; a pure function of the remote path.
    pub storage_key: String,
    /// Identifier assigned by the remote source.
    pub remote_id: String,
    /// Opaque revision tag for the content at the source.
    pub content_version: String,
    /// Display path at the source (e.g. `/2025/Employee-Handbook.docx`).
    pub remote_path: String,
    /// Source partition (drive / library) the document belongs to.
    pub partition_id: String,
    /// Declared file type, lowercase with leading dot (e.g. `.docx`).
    pub file_type: String,
    pub size_bytes: i64,
    pub status: DocStatus,
    /// Heavy-analysis job correlation id, while one is in flight.
    pub job_id: Option<String>,
    /// Storage key of the twin, once one has been written.
    pub twin_key: Option<String>,
    /// Failure reason for `failed` records.
    pub error: Option<String>,
    pub ingested_at: i64,
    pub updated_at: i64,
}

/// Fields required to upsert a document into the registry.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub storage_key: String,
    pub remote_id: String,
    pub content_version: String,
    pub remote_path: String,
    pub partition_id: String,
    pub file_type: String,
    pub size_bytes: i64,
}

/// Incremental-sync cursor for one source partition.
#[derive(Debug, Clone)]
pub struct ChangeCursor {
    pub partition_id: String,
    /// Continuation token from the last completed sync.
    /// `None` means the next run does a full listing.
    pub token: Option<String>,
    pub last_sync_at: Option<i64>,
    pub items_seen: i64,
    pub created: i64,
    pub updated: i64,
    pub deleted: i64,
    pub sync_count: i64,
}

/// A single change reported by the source during a sync run.
#[derive(Debug, Clone)]
pub enum ChangeRecord {
    Upserted(RemoteItem),
    Deleted(DeletedItem),
}

/// A file at the remote source, as reported by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    /// Path within the partition, including the file name.
    pub path: String,
    /// Opaque content-version marker.
    pub version: String,
    #[serde(default)]
    pub size: i64,
    /// Short-lived URL for fetching the raw bytes.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// A deletion reported by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: String,
    /// Path within the partition, when the source still reports it.
    /// Without one the raw object cannot be resolved for cleanup.
    #[serde(default)]
    pub path: Option<String>,
}

/// Closed set of declared file types the router understands.
///
/// Unknown extensions deliberately land in [`FileKind::Unknown`] so that
/// routing has an explicit unsupported arm rather than a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
    /// Legacy binary Office formats; not extractable without a conversion
    /// capability, which is out of scope.
    LegacyDoc,
    LegacyPpt,
    LegacyXls,
    Unknown,
}

impl FileKind {
    /// Classify a file extension (with or without a leading dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "pptx" => FileKind::Pptx,
            "xlsx" => FileKind::Xlsx,
            "txt" => FileKind::Txt,
            "doc" => FileKind::LegacyDoc,
            "ppt" => FileKind::LegacyPpt,
            "xls" => FileKind::LegacyXls,
            _ => FileKind::Unknown,
        }
    }
}

/// How a twin's content was extracted. The string forms are part of the
/// twin wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Textract,
    Docx,
    Pptx,
    Xlsx,
    Txt,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Textract => "textract",
            ExtractionMethod::Docx => "docx",
            ExtractionMethod::Pptx => "pptx",
            ExtractionMethod::Xlsx => "xlsx",
            ExtractionMethod::Txt => "txt",
        }
    }
}

/// One page (or slide, or sheet) of extracted content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// A structured table pulled out of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub table_index: u32,
    /// Page the table was found on, when the extractor knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub rows: Vec<Vec<String>>,
}

/// Result of a successful extraction, either path. Transient: folded into
/// the twin and the registry record, never persisted as-is.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    pub method: ExtractionMethod,
    /// Job correlation id on the heavy-analysis path.
    pub job_id: Option<String>,
}

impl ExtractionOutcome {
    /// Plain-text concatenation of all pages in source order.
    pub fn full_text(&self) -> String {
        let parts: Vec<&str> = self
            .pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            DocStatus::Pending,
            DocStatus::Processing,
            DocStatus::Completed,
            DocStatus::DirectExtracted,
            DocStatus::Failed,
        ] {
            assert_eq!(DocStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocStatus::parse("Completed"), None);
        assert_eq!(DocStatus::parse("twin_ready"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!DocStatus::Pending.is_terminal());
        assert!(!DocStatus::Processing.is_terminal());
        assert!(DocStatus::Completed.is_terminal());
        assert!(DocStatus::DirectExtracted.is_terminal());
        assert!(DocStatus::Failed.is_terminal());
    }

    #[test]
    fn file_kind_classification() {
        assert_eq!(FileKind::from_extension(".pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_extension("PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_extension(".docx"), FileKind::Docx);
        assert_eq!(FileKind::from_extension("doc"), FileKind::LegacyDoc);
        assert_eq!(FileKind::from_extension(".csv"), FileKind::Unknown);
        assert_eq!(FileKind::from_extension(""), FileKind::Unknown);
    }

    #[test]
    fn full_text_skips_empty_pages() {
        let outcome = ExtractionOutcome {
            pages: vec![
                Page {
                    page_number: 1,
                    text: "alpha".into(),
                },
                Page {
                    page_number: 2,
                    text: String::new(),
                },
                Page {
                    page_number: 3,
                    text: "beta".into(),
                },
            ],
            tables: vec![],
            method: ExtractionMethod::Textract,
            job_id: None,
        };
        assert_eq!(outcome.full_text(), "alpha\n\nbeta");
    }
}
