use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::models::feature::Feature;
use crate::models::job::{classify_status, JobId, JobUpdate, SubmitResponse};
use crate::models::request::{MultipartBody, RequestBody};

/// The two calls the poller needs from the generation backend.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Start a job and return the identifier to poll against.
    async fn submit(&self, feature: Feature, body: &RequestBody) -> Result<JobId, BackendError>;

    /// Query the current status of a job.
    async fn poll_once(&self, feature: Feature, job_id: &JobId) -> Result<JobUpdate, BackendError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the recruiting backend's job endpoints.
pub struct HttpBackend {
    http: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .user_agent(concat!("outreach-poller/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Self::with_client(http, &config.api_base_url, config.api_token.clone())
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        api_token: Option<String>,
    ) -> Result<Self, BackendError> {
        // Url::join drops the last segment unless the base ends in '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            api_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Shared HTTP client, reused for artifact downloads.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolve a possibly relative artifact URL against the API base.
    pub fn resolve_url(&self, url: &str) -> Result<Url, BackendError> {
        // "//host/path" keeps its own host and takes the API's scheme
        let relative = if url.starts_with("//") {
            url
        } else {
            url.trim_start_matches('/')
        };
        self.base_url
            .join(relative)
            .or_else(|_| Url::parse(url))
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", url, e)))
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// `<base>/<feature>/<job id>/status`, with the job id escaped as a single segment.
    fn status_url(&self, feature: Feature, job_id: &JobId) -> Result<Url, BackendError> {
        let id = job_id.as_str();
        // Url drops dot segments instead of escaping them
        if id.is_empty() || id == "." || id == ".." {
            return Err(BackendError::InvalidUrl(format!("job id {:?}", id)));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(feature.path())
            .push(id)
            .push("status");
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn multipart_form(body: &MultipartBody) -> Result<Form, BackendError> {
        let mut form = Form::new();
        for (name, value) in &body.fields {
            form = form.text(name.clone(), value.clone());
        }
        if let Some(file) = &body.file {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

/// Best-effort extraction of the backend's error text from a failed response.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let from_json = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error.or(body.message))
        .filter(|m| !m.trim().is_empty());

    match from_json {
        Some(message) => message,
        None if !text.trim().is_empty() && text.len() <= 200 => text.trim().to_string(),
        None => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn submit(&self, feature: Feature, body: &RequestBody) -> Result<JobId, BackendError> {
        let url = self.endpoint(feature.path())?;
        let request = self.authorized(self.http.post(url));
        let request = match body {
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(multipart) => request.multipart(Self::multipart_form(multipart)?),
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = error_message(response).await;
            tracing::warn!(
                feature = %feature,
                status = status.as_u16(),
                error = %message,
                "Backend rejected job submission"
            );
            return Err(BackendError::Rejected { status: Some(status), message });
        }

        let text = response.text().await?;
        let parsed: SubmitResponse = serde_json::from_str(&text)?;
        parsed
            .into_job_id()
            .map_err(|message| BackendError::Rejected { status: Some(status), message })
    }

    async fn poll_once(&self, feature: Feature, job_id: &JobId) -> Result<JobUpdate, BackendError> {
        let url = self.status_url(feature, job_id)?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = error_message(response).await;
            return Err(BackendError::Status { status, message });
        }

        let text = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        Ok(classify_status(value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// True when the backend refused the job outright (bad input, no credits).
    pub fn is_rejection(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}
