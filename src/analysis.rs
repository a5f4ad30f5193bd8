//! Heavy-analysis capability (asynchronous OCR/layout service).
//!
//! Two-phase contract: [`AnalysisService::submit`] hands the service an
//! object locator and returns a correlation id immediately; the service
//! signals completion out-of-band (operationally, a notification that
//! ends up invoking `twindex complete <job_id>`), after which
//! [`AnalysisService::fetch`] retrieves the paginated result. No state is
//! held in memory between the two phases; everything lives in the
//! registry.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{Page, Table};

/// Terminal status reported by the analysis service for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
}

/// Consolidated result of a finished analysis job.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    /// Storage key of the source object the job was started for.
    pub source_key: String,
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Start an asynchronous job for the object at `source_key`.
    /// Returns the job correlation id.
    async fn submit(&self, source_key: &str) -> Result<String>;

    /// Retrieve a finished job's status and full result, following the
    /// service's result pagination to the end.
    async fn fetch(&self, job_id: &str) -> Result<JobResult>;
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ResultPage {
    status: String,
    #[serde(default)]
    status_message: Option<String>,
    source_key: String,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    next_token: Option<String>,
}

/// JSON-over-HTTP analysis client.
///
/// `POST {base}/jobs` starts a job; `GET {base}/jobs/{id}[?token=...]`
/// pages through the result.
pub struct HttpAnalysisService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisService {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::ExtractionService(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn submit(&self, source_key: &str) -> Result<String> {
        let url = format!("{}/jobs", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "source_key": source_key }))
            .send()
            .await
            .map_err(|e| Error::ExtractionService(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::ExtractionService(format!(
                "job submission returned HTTP {}",
                resp.status()
            )));
        }

        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| Error::ExtractionService(format!("malformed submit response: {}", e)))?;
        Ok(body.job_id)
    }

    async fn fetch(&self, job_id: &str) -> Result<JobResult> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let mut pages: Vec<Page> = Vec::new();
        let mut tables: Vec<Table> = Vec::new();
        let mut status: Option<(String, Option<String>)> = None;
        let mut source_key = String::new();
        let mut token: Option<String> = None;

        // Follow the result pagination until the last page.
        loop {
            let mut request = self.client.get(&url);
            if let Some(ref token) = token {
                request = request.query(&[("token", token)]);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| Error::ExtractionService(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(Error::ExtractionService(format!(
                    "job fetch returned HTTP {}",
                    resp.status()
                )));
            }
            let page: ResultPage = resp.json().await.map_err(|e| {
                Error::ExtractionService(format!("malformed result page: {}", e))
            })?;

            if status.is_none() {
                status = Some((page.status.clone(), page.status_message.clone()));
                source_key = page.source_key.clone();
            }
            pages.extend(page.pages);
            tables.extend(page.tables);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let (status_raw, status_message) =
            status.ok_or_else(|| Error::ExtractionService("empty job result".to_string()))?;
        let status = match status_raw.as_str() {
            "succeeded" => JobStatus::Succeeded,
            other => JobStatus::Failed(
                status_message.unwrap_or_else(|| format!("job finished with status '{}'", other)),
            ),
        };

        Ok(JobResult {
            job_id: job_id.to_string(),
            status,
            source_key,
            pages,
            tables,
        })
    }
}
