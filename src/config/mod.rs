use serde::Deserialize;
use std::time::Duration;

use crate::models::feature::{Feature, PollPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Backend API root (e.g., "https://api.example.com/api")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token for the backend, if the deployment requires one
    #[serde(default)]
    pub api_token: Option<String>,

    /// Delay between status checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Consecutive failed status checks tolerated before a session fails (0 = fail fast)
    #[serde(default)]
    pub transient_error_tolerance: u32,

    /// Readiness checks issued against a generated artifact URL
    #[serde(default = "default_artifact_max_attempts")]
    pub artifact_max_attempts: u32,

    #[serde(default = "default_artifact_retry_ms")]
    pub artifact_retry_ms: u64,

    #[serde(default = "default_coffee_chat_max_attempts")]
    pub coffee_chat_max_attempts: u32,

    #[serde(default = "default_interview_prep_max_attempts")]
    pub interview_prep_max_attempts: u32,

    #[serde(default = "default_resume_max_attempts")]
    pub resume_max_attempts: u32,

    #[serde(default = "default_contact_search_max_attempts")]
    pub contact_search_max_attempts: u32,
}

fn default_api_base_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_artifact_max_attempts() -> u32 {
    5
}

fn default_artifact_retry_ms() -> u64 {
    1000
}

fn default_coffee_chat_max_attempts() -> u32 {
    200
}

fn default_interview_prep_max_attempts() -> u32 {
    200
}

fn default_resume_max_attempts() -> u32 {
    60
}

fn default_contact_search_max_attempts() -> u32 {
    90
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn artifact_retry_delay(&self) -> Duration {
        Duration::from_millis(self.artifact_retry_ms)
    }

    /// Polling policy for one feature, with the configured ceilings applied.
    pub fn policy_for(&self, feature: Feature) -> PollPolicy {
        let max_attempts = match feature {
            Feature::CoffeeChatPrep => self.coffee_chat_max_attempts,
            Feature::InterviewPrep => self.interview_prep_max_attempts,
            Feature::ResumeOptimization => self.resume_max_attempts,
            Feature::ContactSearch => self.contact_search_max_attempts,
        };

        PollPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            max_attempts,
        )
        .with_transient_error_tolerance(self.transient_error_tolerance)
    }
}
