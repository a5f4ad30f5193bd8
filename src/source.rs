//! Change-source capability.
//!
//! The remote corpus exposes a paginated change feed per partition. A
//! `None` continuation token means "give me the full listing" (bootstrap
//! or forced resync); afterwards each completed run hands back a token
//! that scopes the next run to the delta.
//!
//! [`HttpChangeSource`] is the thin JSON client for that contract. The
//! source's own protocol (auth, paging internals) stays behind it; here
//! we only map transport-level throttling to the transient error class
//! so the tracker can back off and retry.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{ChangeRecord, DeletedItem, RemoteItem};

/// One page of the change feed.
#[derive(Debug)]
pub struct ChangePage {
    pub records: Vec<ChangeRecord>,
    /// Token identifying the position after this page. Persisted only
    /// once the whole batch has been applied.
    pub next_token: Option<String>,
    pub has_more: bool,
}

#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// List changes for a partition since `token`; `None` requests the
    /// full listing.
    async fn list_changes(&self, partition: &str, token: Option<&str>) -> Result<ChangePage>;

    /// Fetch the raw bytes for an upserted item.
    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>>;
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════════════════

/// Wire shape of one change entry.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireRecord {
    Upserted(RemoteItem),
    Deleted(DeletedItem),
}

#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(default)]
    records: Vec<WireRecord>,
    #[serde(default)]
    next_token: Option<String>,
    #[serde(default)]
    has_more: bool,
}

/// JSON-over-HTTP change source client.
///
/// `GET {base}/partitions/{id}/changes[?token=...]` returns a
/// [`WirePage`]; `429`/`503` map to [`Error::TransientSource`] with the
/// `Retry-After` hint when present.
pub struct HttpChangeSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChangeSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Source(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn classify_status(resp: &reqwest::Response) -> Option<Error> {
        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Some(Error::TransientSource {
                message: format!("source returned HTTP {}", status),
                retry_after,
            });
        }
        if !status.is_success() {
            return Some(Error::Source(format!("source returned HTTP {}", status)));
        }
        None
    }
}

#[async_trait]
impl ChangeSource for HttpChangeSource {
    async fn list_changes(&self, partition: &str, token: Option<&str>) -> Result<ChangePage> {
        let url = format!("{}/partitions/{}/changes", self.base_url, partition);
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }

        let resp = request.send().await.map_err(|e| Error::TransientSource {
            message: e.to_string(),
            retry_after: None,
        })?;
        if let Some(err) = Self::classify_status(&resp) {
            return Err(err);
        }

        let page: WirePage = resp
            .json()
            .await
            .map_err(|e| Error::Source(format!("malformed change page: {}", e)))?;

        let records = page
            .records
            .into_iter()
            .map(|r| match r {
                WireRecord::Upserted(item) => ChangeRecord::Upserted(item),
                WireRecord::Deleted(item) => ChangeRecord::Deleted(item),
            })
            .collect();

        Ok(ChangePage {
            records,
            next_token: page.next_token,
            has_more: page.has_more,
        })
    }

    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>> {
        let url = item
            .download_url
            .as_deref()
            .ok_or_else(|| Error::Source(format!("no download URL for item {}", item.id)))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::TransientSource {
                message: e.to_string(),
                retry_after: None,
            })?;
        if let Some(err) = Self::classify_status(&resp) {
            return Err(err);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::TransientSource {
                message: e.to_string(),
                retry_after: None,
            })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_page_parses_tagged_records() {
        let json = r#"{
            "records": [
                {"kind": "upserted", "id": "1", "name": "a.txt", "path": "/a.txt",
                 "version": "v1", "size": 5, "download_url": "http://x/raw/1"},
                {"kind": "deleted", "id": "2", "path": "/b.txt"}
            ],
            "next_token": "t-2",
            "has_more": true
        }"#;
        let page: WirePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(matches!(&page.records[0], WireRecord::Upserted(item) if item.version == "v1"));
        assert!(matches!(&page.records[1], WireRecord::Deleted(item) if item.id == "2"));
        assert_eq!(page.next_token.as_deref(), Some("t-2"));
        assert!(page.has_more);
    }

    #[test]
    fn wire_page_defaults_are_lenient() {
        let page: WirePage = serde_json::from_str("{}").unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_token.is_none());
        assert!(!page.has_more);
    }
}
