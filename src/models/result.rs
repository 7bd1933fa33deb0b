use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const ARTIFACT_URL_KEYS: &[&str] = &["pdfUrl", "pdf_url", "downloadUrl", "download_url"];

/// Opaque result payload of a completed job. Shape is feature-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Decode into one of the typed result views.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// URL of a generated artifact (PDF), if the payload carries one.
    pub fn artifact_url(&self) -> Option<&str> {
        ARTIFACT_URL_KEYS
            .iter()
            .find_map(|key| {
                self.0
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .filter(|url| !url.is_empty())
            })
    }
}

/// Completed coffee chat prep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeChatPrep {
    #[serde(alias = "pdf_url", default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub contact: Option<serde_json::Value>,
    #[serde(alias = "company_news", default)]
    pub company_news: Vec<serde_json::Value>,
    #[serde(alias = "talking_points", default)]
    pub talking_points: Vec<String>,
}

/// Completed interview prep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrep {
    #[serde(alias = "pdf_url", default)]
    pub pdf_url: Option<String>,
    #[serde(alias = "company_name", default)]
    pub company_name: Option<String>,
    #[serde(alias = "job_title", default)]
    pub job_title: Option<String>,
}

/// Completed resume optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedResume {
    #[serde(alias = "pdf_url", default)]
    pub pdf_url: Option<String>,
    #[serde(alias = "ats_score", default)]
    pub ats_score: Option<f64>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// One contact returned by a completed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(alias = "first_name", default)]
    pub first_name: String,
    #[serde(alias = "last_name", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "job_title", default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(alias = "linkedin_url", default)]
    pub linkedin_url: Option<String>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Completed contact search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSearchResults {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub total: Option<u32>,
}
