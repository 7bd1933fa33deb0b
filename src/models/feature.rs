use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Long-running generation features exposed by the backend.
///
/// The kebab-case form doubles as the endpoint path segment
/// (`POST /coffee-chat-prep`, `GET /coffee-chat-prep/{jobId}/status`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Feature {
    CoffeeChatPrep,
    InterviewPrep,
    ResumeOptimization,
    ContactSearch,
}

impl Feature {
    /// URL path segment for this feature's endpoints.
    pub fn path(self) -> &'static str {
        self.into()
    }

    /// Interval and attempt ceiling observed for each feature.
    pub fn default_policy(self) -> PollPolicy {
        match self {
            Feature::CoffeeChatPrep => PollPolicy::new(Duration::from_secs(2), 200),
            Feature::InterviewPrep => PollPolicy::new(Duration::from_secs(3), 200),
            Feature::ResumeOptimization => PollPolicy::new(Duration::from_secs(2), 60),
            Feature::ContactSearch => PollPolicy::new(Duration::from_secs(2), 90),
        }
    }
}

/// Fixed-interval polling policy for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Consecutive failed status checks tolerated before the session fails.
    pub transient_error_tolerance: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            transient_error_tolerance: 0,
        }
    }

    pub fn with_transient_error_tolerance(mut self, tolerance: u32) -> Self {
        self.transient_error_tolerance = tolerance;
        self
    }

    /// Upper bound on wall-clock time spent sleeping between checks.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}
