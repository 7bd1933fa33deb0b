//! Human-readable progress messages for backend stage labels.
//!
//! The backend owns the set of stage labels and adds new ones freely, so the
//! lookup is total: anything unrecognized reads as a generic message.

use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Message shown for unknown or missing stage labels.
pub const GENERIC_PROGRESS_MESSAGE: &str = "Processing...";

/// Stage labels this client knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Pending,
    Queued,
    Processing,
    EnrichingProfile,
    ResearchingCompany,
    FetchingNews,
    GeneratingContent,
    GeneratingPdf,
    SearchingContacts,
    EnrichingContacts,
    ParsingResume,
    AnalyzingJob,
    OptimizingResume,
}

impl Stage {
    pub fn parse(label: &str) -> Option<Self> {
        Stage::from_str(label).ok()
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Pending | Stage::Queued => "Waiting to start...",
            Stage::Processing => GENERIC_PROGRESS_MESSAGE,
            Stage::EnrichingProfile => "Looking up profile details...",
            Stage::ResearchingCompany => "Researching the company...",
            Stage::FetchingNews => "Gathering recent news...",
            Stage::GeneratingContent => "Writing talking points...",
            Stage::GeneratingPdf => "Building your PDF...",
            Stage::SearchingContacts => "Searching for contacts...",
            Stage::EnrichingContacts => "Finding contact details...",
            Stage::ParsingResume => "Reading your resume...",
            Stage::AnalyzingJob => "Analyzing the job posting...",
            Stage::OptimizingResume => "Tailoring your resume...",
        }
    }
}

/// Map a raw status label to the message shown while a job is in flight.
pub fn progress_message(label: Option<&str>) -> &'static str {
    label
        .and_then(Stage::parse)
        .map(Stage::message)
        .unwrap_or(GENERIC_PROGRESS_MESSAGE)
}
