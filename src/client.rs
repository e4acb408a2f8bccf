use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;

use crate::advisor::GridRequest;
use crate::config::{CollageConfig, OutputFormat};
use crate::error::{CollageError, Result};
use crate::poller::{self, PollConfig};
use crate::types::*;
use crate::upload::UploadSet;

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Map a non-success response body to an error.
///
/// The service reports rate limiting (HTTP 429) with an `{error}` body and
/// everything else with `{detail}`; the user should see the message, never
/// the raw status code alone.
fn classify_error(status: u16, body: &str) -> CollageError {
    let json: Option<Value> = serde_json::from_str(body).ok();
    if status == 429 {
        let message = json
            .as_ref()
            .and_then(|j| j.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or("Too many requests, please slow down")
            .to_string();
        return CollageError::RateLimited(message);
    }
    let message = json
        .as_ref()
        .and_then(|j| j.get("detail"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.to_string());
    CollageError::Http { status, message }
}

/// Suggested download filename for a job's artifact.
fn artifact_filename(job_id: &str, format: Option<OutputFormat>) -> String {
    let ext = format.as_ref().map(|f| f.extension()).unwrap_or("jpg");
    format!("collage_{}.{}", job_id, ext)
}

/// Async client for a collage generation service instance.
///
/// Provides REST methods for job creation, status queries, artifact
/// download, grid optimization, and overlap analysis, plus
/// [`watch_job`](Self::watch_job) to drive the poll loop until a job
/// reaches a terminal state.
///
/// # Example
/// ```no_run
/// use collage_client::CollageClient;
///
/// # async fn example() -> collage_client::Result<()> {
/// let client = CollageClient::new("http://127.0.0.1:8000");
/// let healthy = client.health().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CollageClient {
    http: Client,
    endpoint: String,
}

impl CollageClient {
    /// Create a new client pointing at the given service endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Check whether the service is reachable via `/health`.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.endpoint);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: format!(
                    "Cannot connect to collage service at {}, is it running?",
                    self.endpoint
                ),
                source: e,
            })?;
        Ok(resp.status().is_success())
    }

    // ── Job submission ──────────────────────────────────────────────

    /// Submit a new collage job: the staged files plus the flattened
    /// configuration fields, as one multipart request.
    ///
    /// Refuses client-side, with no network call, when the upload set has
    /// too few files or the configuration is malformed. On success returns
    /// the local `pending` placeholder snapshot carrying the new job id;
    /// the authoritative state arrives with the first status poll. Existing
    /// job state is never touched on failure.
    pub async fn create_job(
        &self,
        config: &CollageConfig,
        uploads: &UploadSet,
    ) -> Result<JobSnapshot> {
        uploads.ensure_submittable()?;
        config.validate().map_err(CollageError::Config)?;

        let form = build_job_form(config, uploads)?;
        let url = format!("{}/api/collage/create", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(120))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: format!(
                    "Cannot connect to collage service at {}, is it running?",
                    self.endpoint
                ),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let created: CreateResponse = resp.json().await.map_err(|e| CollageError::Network {
            context: "Failed to parse job creation response".into(),
            source: e,
        })?;

        Ok(JobSnapshot::pending(created.job_id))
    }

    // ── Status ──────────────────────────────────────────────────────

    /// Fetch the current snapshot for a job.
    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        let url = format!("{}/api/collage/status/{}", self.endpoint, job_id);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: format!("Failed to fetch status for job {}", job_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        resp.json().await.map_err(|e| CollageError::Network {
            context: format!("Failed to parse status for job {}", job_id),
            source: e,
        })
    }

    /// Poll a job's status until it reaches a terminal state, the cancel
    /// flag is set, or the configured timeout elapses. `on_update` fires
    /// for each applied snapshot; stale responses are discarded per the
    /// [`poller::JobTracker`] ordering rules.
    pub async fn watch_job<U>(
        &self,
        job_id: &str,
        config: &PollConfig,
        cancel: &Arc<AtomicBool>,
        on_update: U,
    ) -> Result<PollOutcome>
    where
        U: FnMut(&JobSnapshot),
    {
        poller::poll_job(|| self.status(job_id), config, cancel, on_update).await
    }

    // ── Artifact download ───────────────────────────────────────────

    /// Download a completed job's artifact. Returns the raw bytes plus a
    /// suggested filename derived from the job id and output encoding.
    ///
    /// The job must be `completed`; saving the bytes anywhere is the
    /// caller's concern.
    pub async fn download(
        &self,
        job_id: &str,
        format: Option<OutputFormat>,
    ) -> Result<Artifact> {
        let url = format!("{}/api/collage/download/{}", self.endpoint, job_id);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: format!("Failed to fetch artifact for job {}", job_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let bytes = resp.bytes().await.map_err(|e| CollageError::Network {
            context: "Failed to read artifact bytes".into(),
            source: e,
        })?;

        Ok(Artifact {
            bytes: bytes.to_vec(),
            filename: artifact_filename(job_id, format),
        })
    }

    // ── Grid advisor ────────────────────────────────────────────────

    /// Ask the service how the current image count fits a rectangular
    /// grid. The returned suggestions are rendered verbatim; apply actions
    /// live in [`crate::advisor`].
    pub async fn optimize_grid(&self, request: &GridRequest) -> Result<GridOptimization> {
        let url = format!("{}/api/collage/optimize-grid", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(10))
            .form(&request.to_form_fields())
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: "Failed to request grid optimization".into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        resp.json().await.map_err(|e| CollageError::Network {
            context: "Failed to parse grid optimization response".into(),
            source: e,
        })
    }

    // ── Overlap analysis ────────────────────────────────────────────

    /// Dry-run the layout and report overlapping placements. Takes the
    /// same multipart body as [`create_job`](Self::create_job).
    pub async fn analyze_overlaps(
        &self,
        config: &CollageConfig,
        uploads: &UploadSet,
    ) -> Result<OverlapAnalysis> {
        uploads.ensure_submittable()?;
        config.validate().map_err(CollageError::Config)?;

        let form = build_job_form(config, uploads)?;
        let url = format!("{}/api/collage/analyze-overlaps", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(120))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: "Failed to request overlap analysis".into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        resp.json().await.map_err(|e| CollageError::Network {
            context: "Failed to parse overlap analysis response".into(),
            source: e,
        })
    }

    // ── Housekeeping ────────────────────────────────────────────────

    /// List every job the service currently knows about.
    pub async fn list_jobs(&self) -> Result<Vec<JobSnapshot>> {
        let url = format!("{}/api/collage/jobs", self.endpoint);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: "Failed to fetch job list".into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let json: Value = resp.json().await.map_err(|e| CollageError::Network {
            context: "Failed to parse job list".into(),
            source: e,
        })?;
        parse_job_list(json)
    }

    /// Release backend-side resources for a finished job.
    pub async fn cleanup(&self, job_id: &str) -> Result<()> {
        let url = format!("{}/api/collage/cleanup/{}", self.endpoint, job_id);
        let resp = self
            .http
            .delete(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| CollageError::Network {
                context: format!("Failed to clean up job {}", job_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        Ok(())
    }
}

/// Assemble the multipart body shared by job creation and overlap
/// analysis: repeated `files` parts followed by the flattened config.
fn build_job_form(config: &CollageConfig, uploads: &UploadSet) -> Result<Form> {
    let mut form = Form::new();
    for file in uploads.files() {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| {
                CollageError::Other(format!("Invalid MIME type {}: {}", file.mime, e))
            })?;
        form = form.part("files", part);
    }
    for (key, value) in config.to_form_fields() {
        form = form.text(key, value);
    }
    Ok(form)
}

/// The jobs endpoint has returned both `{"jobs": [...]}` and a bare array
/// across service versions; accept either.
fn parse_job_list(json: Value) -> Result<Vec<JobSnapshot>> {
    let items = match json {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("jobs") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CollageError::InvalidResponse(
                    "Job list response missing jobs array".into(),
                ))
            }
        },
        _ => {
            return Err(CollageError::InvalidResponse(
                "Unexpected job list response shape".into(),
            ))
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(CollageError::Json))
        .collect()
}
