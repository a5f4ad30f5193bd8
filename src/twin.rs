//! Digital twin assembly and storage.
//!
//! A twin is the normalized JSON artifact produced from a document's
//! extracted content, written next to the source tree under the twin
//! prefix (`extracted/...`) with the extension normalized to `.json`.
//! Twins are immutable once written; re-extraction writes a fresh twin at
//! the same derived key, so the last extraction wins.
//!
//! The top-level key set and `extraction_metadata.method` values are a
//! wire contract shared with downstream consumers (schema version `2.0`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{DocumentRecord, ExtractionOutcome, Page, Table};
use crate::paths;
use crate::registry::Registry;
use crate::store::{ObjectStore, Tags};

/// Current twin schema version.
pub const SCHEMA_VERSION: &str = "2.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct Twin {
    pub schema_version: String,
    /// Hex SHA-256 of the source storage key.
    pub document_id: String,
    pub source_s3_key: String,
    pub filename: String,
    pub file_type: String,
    pub metadata: TwinMetadata,
    pub extracted_text: String,
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    pub extraction_metadata: ExtractionMetadata,
}

/// Source metadata carried over from the registry record.
#[derive(Debug, Serialize, Deserialize)]
pub struct TwinMetadata {
    pub library: String,
    pub path: String,
    pub remote_id: String,
    pub content_version: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub method: String,
    pub job_id: Option<String>,
    /// RFC 3339 timestamp of when the twin was assembled.
    pub timestamp: String,
    pub page_count: usize,
}

/// Stable document identity derived from the storage key.
pub fn document_id(storage_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(storage_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Assemble a twin from a registry record and an extraction outcome.
/// Pure; storage and registry bookkeeping live in [`TwinBuilder`].
pub fn assemble(record: &DocumentRecord, outcome: &ExtractionOutcome) -> Twin {
    let filename = paths::file_name(&record.remote_path);
    let filename = if filename.is_empty() {
        paths::file_name(&record.storage_key)
    } else {
        filename
    };

    Twin {
        schema_version: SCHEMA_VERSION.to_string(),
        document_id: document_id(&record.storage_key),
        source_s3_key: record.storage_key.clone(),
        filename: filename.to_string(),
        file_type: record.file_type.clone(),
        metadata: TwinMetadata {
            library: record.partition_id.clone(),
            path: record.remote_path.clone(),
            remote_id: record.remote_id.clone(),
            content_version: record.content_version.clone(),
            size_bytes: record.size_bytes,
        },
        extracted_text: outcome.full_text(),
        pages: outcome.pages.clone(),
        tables: outcome.tables.clone(),
        extraction_metadata: ExtractionMetadata {
            method: outcome.method.as_str().to_string(),
            job_id: outcome.job_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            page_count: outcome.pages.len(),
        },
    }
}

/// Writes twins and keeps the registry in step.
pub struct TwinBuilder<'a> {
    store: &'a dyn ObjectStore,
    registry: &'a Registry,
    source_prefix: &'a str,
    twin_prefix: &'a str,
}

impl<'a> TwinBuilder<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        registry: &'a Registry,
        source_prefix: &'a str,
        twin_prefix: &'a str,
    ) -> Self {
        Self {
            store,
            registry,
            source_prefix,
            twin_prefix,
        }
    }

    /// Assemble the twin, write it at its derived key, and mark the
    /// record complete. On any failure the registry is marked `failed`
    /// and no partial twin is left behind.
    ///
    /// Returns the twin key, or `None` when the completing write lost to
    /// a concurrent transition (record superseded or deleted mid-flight).
    pub async fn build_and_store(
        &self,
        record: &DocumentRecord,
        outcome: &ExtractionOutcome,
    ) -> Result<Option<String>> {
        let twin_key = paths::twin_key(self.source_prefix, self.twin_prefix, &record.storage_key);

        let write_result: Result<()> = async {
            let twin = assemble(record, outcome);
            let body = serde_json::to_vec_pretty(&twin)?;
            let tags = self.twin_tags(record);
            self.store.put(&twin_key, &body, &tags).await
        }
        .await;

        if let Err(e) = write_result {
            let reason = e.to_string();
            warn!(key = %record.storage_key, error = %reason, "twin write failed");
            self.registry.mark_failed(&record.storage_key, &reason).await?;
            return Err(e);
        }

        let applied = self
            .registry
            .mark_complete(&record.storage_key, &twin_key, outcome.method)
            .await?;
        if !applied {
            // The record moved on (new version or deletion) while the
            // twin was being written; the stale twin will be overwritten
            // or cleaned up by whichever transition won.
            warn!(key = %record.storage_key, "completion superseded, twin left for successor");
            return Ok(None);
        }

        info!(key = %record.storage_key, twin = %twin_key, method = outcome.method.as_str(), "twin built");
        Ok(Some(twin_key))
    }

    /// Carry source identity tags onto the twin object.
    fn twin_tags(&self, record: &DocumentRecord) -> Tags {
        let mut tags = Tags::new();
        let mut insert = |key: &str, value: &str| {
            if !value.is_empty() {
                tags.insert(key.to_string(), value.to_string());
            }
        };
        insert("partition", &record.partition_id);
        insert("remote-path", &record.remote_path);
        insert("remote-id", &record.remote_id);
        insert("twin-type", "extracted-json");
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocStatus, ExtractionMethod};

    fn record() -> DocumentRecord {
        DocumentRecord {
            storage_key: "source/hr-policies/2025/Handbook.docx".into(),
            remote_id: "item-9".into(),
            content_version: "v3".into(),
            remote_path: "/2025/Handbook.docx".into(),
            partition_id: "hr-policies".into(),
            file_type: ".docx".into(),
            size_bytes: 2048,
            status: DocStatus::Processing,
            job_id: None,
            twin_key: None,
            error: None,
            ingested_at: 0,
            updated_at: 0,
        }
    }

    fn outcome() -> ExtractionOutcome {
        ExtractionOutcome {
            pages: vec![
                Page {
                    page_number: 1,
                    text: "Page one.".into(),
                },
                Page {
                    page_number: 2,
                    text: "Page two.".into(),
                },
            ],
            tables: vec![Table {
                table_index: 1,
                page_number: Some(2),
                rows: vec![vec!["a".into(), "b".into()]],
            }],
            method: ExtractionMethod::Docx,
            job_id: None,
        }
    }

    #[test]
    fn document_id_is_stable() {
        let a = document_id("source/x/y.docx");
        let b = document_id("source/x/y.docx");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, document_id("source/x/z.docx"));
    }

    #[test]
    fn assemble_fills_wire_schema() {
        let twin = assemble(&record(), &outcome());
        assert_eq!(twin.schema_version, "2.0");
        assert_eq!(twin.source_s3_key, "source/hr-policies/2025/Handbook.docx");
        assert_eq!(twin.filename, "Handbook.docx");
        assert_eq!(twin.file_type, ".docx");
        assert_eq!(twin.metadata.library, "hr-policies");
        assert_eq!(twin.extracted_text, "Page one.\n\nPage two.");
        assert_eq!(twin.extraction_metadata.method, "docx");
        assert_eq!(twin.extraction_metadata.page_count, 2);
    }

    #[test]
    fn twin_json_has_exact_top_level_keys() {
        let twin = assemble(&record(), &outcome());
        let value = serde_json::to_value(&twin).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "document_id",
                "extracted_text",
                "extraction_metadata",
                "file_type",
                "filename",
                "metadata",
                "pages",
                "schema_version",
                "source_s3_key",
                "tables",
            ]
        );
        assert_eq!(value["extraction_metadata"]["method"], "docx");
    }
}
