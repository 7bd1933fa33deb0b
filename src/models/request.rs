use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::feature::Feature;

const RESUME_FIELD: &str = "resume";
const PDF_MIME: &str = "application/pdf";

/// Wire body for a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// A validated generation request for one feature.
pub trait JobRequest: Validate<Context = ()> {
    const FEATURE: Feature;

    /// Build the wire body. Callers normally go through [`JobRequest::prepare`].
    fn body(&self) -> Result<RequestBody, RequestError>;

    /// Validate the payload, then build its body.
    fn prepare(&self) -> Result<RequestBody, RequestError> {
        self.validate()?;
        self.body()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] garde::Report),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

fn json_body<T: Serialize>(value: &T) -> Result<RequestBody, RequestError> {
    Ok(RequestBody::Json(serde_json::to_value(value)?))
}

fn http_url_parts(value: &str) -> Option<(&str, &str)> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))?;
    match rest.find('/') {
        Some(idx) => Some((&rest[..idx], &rest[idx..])),
        None => Some((rest, "")),
    }
}

fn linkedin_profile(value: &str, _ctx: &()) -> garde::Result {
    let (host, path) = http_url_parts(value.trim())
        .ok_or_else(|| garde::Error::new("must be an http(s) URL"))?;
    let host = host.to_ascii_lowercase();
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return Err(garde::Error::new("must be a linkedin.com URL"));
    }
    if !path.starts_with("/in/") || path.len() <= "/in/".len() {
        return Err(garde::Error::new("must point to a LinkedIn profile (/in/...)"));
    }
    Ok(())
}

fn pdf_file_name(value: &str, _ctx: &()) -> garde::Result {
    if value.to_ascii_lowercase().ends_with(".pdf") {
        Ok(())
    } else {
        Err(garde::Error::new("resume must be a PDF"))
    }
}

/// Request for coffee chat prep generation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeChatPrepRequest {
    #[garde(custom(linkedin_profile))]
    pub linkedin_url: String,
}

impl JobRequest for CoffeeChatPrepRequest {
    const FEATURE: Feature = Feature::CoffeeChatPrep;

    fn body(&self) -> Result<RequestBody, RequestError> {
        json_body(self)
    }
}

/// Request for interview prep generation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrepRequest {
    #[garde(url)]
    pub job_posting_url: String,
}

impl JobRequest for InterviewPrepRequest {
    const FEATURE: Feature = Feature::InterviewPrep;

    fn body(&self) -> Result<RequestBody, RequestError> {
        json_body(self)
    }
}

/// Criteria for a contact search.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactSearchRequest {
    #[garde(length(min = 1, max = 200))]
    pub company: String,

    #[garde(length(min = 1, max = 200))]
    pub job_title: String,

    #[garde(length(min = 1, max = 200))]
    pub location: String,

    #[garde(range(min = 1, max = 15))]
    pub max_contacts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 200))]
    pub college_alumni: Option<String>,
}

impl JobRequest for ContactSearchRequest {
    const FEATURE: Feature = Feature::ContactSearch;

    fn body(&self) -> Result<RequestBody, RequestError> {
        json_body(self)
    }
}

/// Resume file attached to an optimization request.
#[derive(Debug, Clone, Validate)]
pub struct ResumeFile {
    #[garde(custom(pdf_file_name))]
    pub file_name: String,

    #[garde(length(min = 1, max = 10485760))]
    pub bytes: Vec<u8>,
}

/// Request to optimize a resume against a job posting.
///
/// Without an attached file the backend uses the resume already on record.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResumeOptimizationRequest {
    #[garde(length(min = 1, max = 200))]
    pub job_title: String,

    #[garde(length(min = 1, max = 200))]
    pub company: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(url)]
    pub job_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(max = 20000))]
    pub job_description: Option<String>,

    #[serde(skip)]
    #[garde(dive)]
    pub resume: Option<ResumeFile>,
}

impl JobRequest for ResumeOptimizationRequest {
    const FEATURE: Feature = Feature::ResumeOptimization;

    fn body(&self) -> Result<RequestBody, RequestError> {
        let Some(resume) = &self.resume else {
            return json_body(self);
        };

        let mut fields = vec![
            ("jobTitle".to_string(), self.job_title.clone()),
            ("company".to_string(), self.company.clone()),
        ];
        if let Some(url) = &self.job_url {
            fields.push(("jobUrl".to_string(), url.clone()));
        }
        if let Some(description) = &self.job_description {
            fields.push(("jobDescription".to_string(), description.clone()));
        }

        Ok(RequestBody::Multipart(MultipartBody {
            fields,
            file: Some(FilePart {
                field: RESUME_FIELD.to_string(),
                file_name: resume.file_name.clone(),
                mime: PDF_MIME.to_string(),
                bytes: resume.bytes.clone(),
            }),
        }))
    }
}
