//! Control-API HTTP client: claim / submit / fail / recover-stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrichment_types::{ClaimedChunk, DocType, Entity, Relationship, Task, Tier2Result};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seam between the scheduler and the control API.
///
/// Exists so tests can swap in a mock that records calls instead of making
/// real HTTP requests; [`HttpControlClient`] is the only production
/// implementation.
#[async_trait]
pub(crate) trait ControlClient: Send + Sync {
    /// Claim one task, if the queue has one ready.
    ///
    /// Returns `Ok(None)` for the `{}` empty-queue response; any non-2xx
    /// status becomes an `Err` the caller treats as a transient control-API
    /// error.
    async fn claim(&self, worker_id: &str, lease_duration_secs: u64) -> anyhow::Result<Option<Task>>;

    /// Submit a task's result. Called exactly once per attempt, on success.
    async fn submit(&self, task_id: &str, result: &SubmitResult<'_>) -> anyhow::Result<()>;

    /// Report a task failure. The control API decides retry vs. dead-letter.
    async fn fail(&self, task_id: &str, error: &str) -> anyhow::Result<()>;

    /// Recover leases whose visibility timeout has expired, resetting them
    /// to `pending`. Called once per watchdog tick.
    async fn recover_stale(&self) -> anyhow::Result<u32>;
}

/// Production [`ControlClient`]: talks to the real control API over HTTP.
pub(crate) struct HttpControlClient {
    http: reqwest::Client,
    api_url: Url,
    api_token: String,
}

impl HttpControlClient {
    pub(crate) fn new(http: reqwest::Client, api_url: Url, api_token: String) -> Self {
        Self { http, api_url, api_token }
    }
}

/// A failed call to the control API.
///
/// Distinguishes errors a caller should retry (network failures, 5xx
/// responses) from ones it shouldn't (4xx responses, which indicate the
/// request itself was rejected and retrying unchanged won't help).
#[derive(Debug, thiserror::Error)]
pub(crate) enum ControlApiError {
    /// Network failure or 5xx response; the caller may retry.
    #[error("transient control-api error ({endpoint}): {detail}")]
    Transient {
        /// Endpoint path the request was made to, for diagnostics.
        endpoint: &'static str,
        /// Error text: transport error or `"http {status}: {body}"`.
        detail: String,
    },
    /// 4xx response; the request was rejected and retrying won't help.
    #[error("permanent control-api error ({endpoint}): {detail}")]
    Permanent {
        /// Endpoint path the request was made to, for diagnostics.
        endpoint: &'static str,
        /// Error text: `"http {status}: {body}"`.
        detail: String,
    },
}

/// Build a [`ControlApiError`] from a non-success response, classifying by
/// status code: 4xx is permanent, everything else (5xx, odd ranges) is
/// treated as transient.
async fn status_error(endpoint: &'static str, res: reqwest::Response) -> ControlApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let detail = format!("http {status}: {body}");
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        ControlApiError::Permanent { endpoint, detail }
    } else {
        ControlApiError::Transient { endpoint, detail }
    }
}

#[derive(Debug, Serialize)]
struct ClaimRequest<'a> {
    #[serde(rename = "workerId")]
    worker_id: &'a str,
    #[serde(rename = "leaseDuration")]
    lease_duration: u64,
}

#[derive(Debug, Deserialize)]
struct ClaimResponseDto {
    task: Option<TaskDto>,
    chunks: Option<Vec<ClaimedChunk>>,
}

#[derive(Debug, Deserialize)]
struct TaskDto {
    id: String,
    attempt: u32,
    payload: TaskPayloadDto,
    #[serde(rename = "retryAfter")]
    retry_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TaskPayloadDto {
    #[serde(rename = "baseId")]
    base_id: String,
    #[serde(rename = "chunkIndex")]
    chunk_index: u32,
    #[serde(rename = "totalChunks")]
    total_chunks: u32,
    #[serde(rename = "docType")]
    doc_type: DocType,
    collection: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResult<'a> {
    #[serde(rename = "chunkId")]
    pub(crate) chunk_id: String,
    pub(crate) collection: &'a str,
    pub(crate) tier2: &'a Tier2Result,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tier3: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) entities: Option<&'a Vec<Entity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) relationships: Option<&'a Vec<Relationship>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FailRequest<'a> {
    error: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecoverStaleResponse {
    recovered: u32,
}

#[async_trait]
impl ControlClient for HttpControlClient {
    async fn claim(&self, worker_id: &str, lease_duration_secs: u64) -> anyhow::Result<Option<Task>> {
        let url = self.api_url.join("internal/tasks/claim")?;
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&ClaimRequest {
                worker_id,
                lease_duration: lease_duration_secs,
            })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(status_error("internal/tasks/claim", res).await.into());
        }

        let parsed: ClaimResponseDto = res.json().await?;
        let Some(task) = parsed.task else {
            return Ok(None);
        };

        Ok(Some(Task {
            task_id: task.id,
            attempt: task.attempt,
            base_id: task.payload.base_id,
            chunk_index: task.payload.chunk_index,
            total_chunks: task.payload.total_chunks,
            doc_type: task.payload.doc_type,
            collection: task.payload.collection,
            text: task.payload.text,
            source: task.payload.source,
            chunks: parsed.chunks.unwrap_or_default(),
            retry_after: task.retry_after,
        }))
    }

    async fn submit(&self, task_id: &str, result: &SubmitResult<'_>) -> anyhow::Result<()> {
        let url = self.api_url.join(&format!("internal/tasks/{task_id}/result"))?;
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(result)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(status_error("internal/tasks/{id}/result", res).await.into());
        }
        Ok(())
    }

    async fn fail(&self, task_id: &str, error: &str) -> anyhow::Result<()> {
        let url = self.api_url.join(&format!("internal/tasks/{task_id}/fail"))?;
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&FailRequest { error })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(status_error("internal/tasks/{id}/fail", res).await.into());
        }
        Ok(())
    }

    async fn recover_stale(&self) -> anyhow::Result<u32> {
        let url = self.api_url.join("internal/tasks/recover-stale")?;
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(status_error("internal/tasks/recover-stale", res).await.into());
        }

        let parsed: RecoverStaleResponse = res.json().await?;
        Ok(parsed.recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_error_message_names_endpoint_and_detail() {
        let err = ControlApiError::Permanent {
            endpoint: "internal/tasks/claim",
            detail: "http 400 Bad Request: bad worker id".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("internal/tasks/claim"));
        assert!(rendered.contains("400"));
    }

    #[test]
    fn transient_error_message_names_endpoint_and_detail() {
        let err = ControlApiError::Transient {
            endpoint: "internal/tasks/recover-stale",
            detail: "http 503 Service Unavailable: ".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("internal/tasks/recover-stale"));
        assert!(rendered.contains("503"));
    }
}
