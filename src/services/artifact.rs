use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;

/// Waits for a generated artifact (e.g., a PDF) to become downloadable.
///
/// Download URLs are handed out before the file is always in place, so the
/// probe retries a few times. Its ceiling is independent of the status poller's.
pub struct ArtifactProbe {
    http: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ArtifactProbe {
    pub fn new(http: Client, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            http,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(http: Client, config: &ClientConfig) -> Self {
        Self::new(http, config.artifact_max_attempts, config.artifact_retry_delay())
    }

    /// Probe `url` until it answers 200, retrying up to the configured ceiling.
    pub async fn wait_until_ready(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ArtifactError> {
        let url = Url::parse(url).map_err(|e| ArtifactError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut last_status = None;

        for attempt in 1..=self.max_attempts {
            let probed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ArtifactError::Cancelled),
                result = self.probe(&url) => result,
            };

            match probed {
                Ok(StatusCode::OK) => {
                    tracing::debug!(url = %url, attempt, "Artifact ready");
                    return Ok(());
                }
                Ok(status) => {
                    tracing::debug!(url = %url, attempt, status = status.as_u16(), "Artifact not ready yet");
                    last_status = Some(status);
                }
                Err(e) => {
                    tracing::debug!(url = %url, attempt, error = %e, "Artifact probe failed");
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ArtifactError::Cancelled),
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        tracing::warn!(url = %url, attempts = self.max_attempts, "Artifact never became available");
        Err(ArtifactError::NotReady {
            attempts: self.max_attempts,
            last_status,
        })
    }

    /// HEAD the URL, falling back to GET for servers that do not allow HEAD.
    async fn probe(&self, url: &Url) -> Result<StatusCode, reqwest::Error> {
        let status = self.http.head(url.clone()).send().await?.status();
        if status != StatusCode::METHOD_NOT_ALLOWED {
            return Ok(status);
        }
        Ok(self.http.get(url.clone()).send().await?.status())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not available after {attempts} attempts (last status: {last_status:?})")]
    NotReady {
        attempts: u32,
        last_status: Option<StatusCode>,
    },

    #[error("Artifact wait cancelled")]
    Cancelled,

    #[error("Invalid artifact URL: {0}")]
    InvalidUrl(String),
}
