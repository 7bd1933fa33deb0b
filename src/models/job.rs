use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::result::JobPayload;

const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";
const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

/// Opaque job identifier assigned by the backend on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body returned by `POST /<feature>`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "jobId", alias = "job_id", default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl SubmitResponse {
    /// Extract the job id, treating an `error` field or a missing id as a rejection.
    pub fn into_job_id(self) -> Result<JobId, String> {
        if let Some(error) = error_text(self.error.as_ref()) {
            return Err(error);
        }
        match self.job_id {
            Some(id) if !id.trim().is_empty() => Ok(JobId(id)),
            _ => Err("Backend did not return a job id".to_string()),
        }
    }
}

/// Body returned by `GET /<feature>/{jobId}/status`.
///
/// Only `status` is read up front. Everything else, `error` included, stays in
/// `body` untouched so a completed job keeps its whole response.
#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub status: Option<String>,
    pub body: serde_json::Map<String, serde_json::Value>,
}

/// Classified outcome of one status check.
///
/// Only `completed` and `failed` are terminal. Every other label, including
/// ones this client has never seen and a missing status, means "keep polling".
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Completed(JobPayload),
    Failed(String),
    Pending(Option<String>),
}

impl JobUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobUpdate::Pending(_))
    }
}

impl StatusResponse {
    pub fn from_body(body: serde_json::Map<String, serde_json::Value>) -> Self {
        let status = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Self { status, body }
    }

    pub fn into_update(self) -> JobUpdate {
        match self.status.as_deref() {
            Some(STATUS_COMPLETED) => {
                JobUpdate::Completed(JobPayload::new(serde_json::Value::Object(self.body)))
            }
            Some(STATUS_FAILED) => JobUpdate::Failed(failure_message(self.body.get("error"))),
            _ => JobUpdate::Pending(self.status),
        }
    }
}

impl From<StatusResponse> for JobUpdate {
    fn from(response: StatusResponse) -> Self {
        response.into_update()
    }
}

/// Text of an `error` field, which may be a string or an object with a message.
fn error_text(error: Option<&serde_json::Value>) -> Option<String> {
    let message = match error {
        Some(serde_json::Value::String(text)) => Some(text.as_str()),
        Some(serde_json::Value::Object(fields)) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(serde_json::Value::as_str)),
        _ => None,
    };
    message.filter(|m| !m.trim().is_empty()).map(str::to_string)
}

fn failure_message(error: Option<&serde_json::Value>) -> String {
    error_text(error).unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
}

/// Classify a decoded JSON status body. Non-object bodies are treated as non-terminal.
pub fn classify_status(value: serde_json::Value) -> JobUpdate {
    match value {
        serde_json::Value::Object(body) => StatusResponse::from_body(body).into_update(),
        _ => JobUpdate::Pending(None),
    }
}
