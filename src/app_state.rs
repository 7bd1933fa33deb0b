use std::sync::Arc;

use crate::config::ClientConfig;
use crate::models::feature::{Feature, PollPolicy};
use crate::models::request::{JobRequest, RequestError};
use crate::services::{
    artifact::ArtifactProbe,
    backend::{BackendError, HttpBackend, JobBackend},
    session::FeatureSlot,
};
use uuid::Uuid;

/// Dashboard-wide state: one independent session slot per feature.
pub struct DashboardState<B: ?Sized = HttpBackend> {
    pub backend: Arc<B>,
    pub artifacts: ArtifactProbe,
    pub coffee_chat: FeatureSlot<B>,
    pub interview_prep: FeatureSlot<B>,
    pub resume: FeatureSlot<B>,
    pub contacts: FeatureSlot<B>,
}

impl DashboardState<HttpBackend> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        let artifacts = ArtifactProbe::from_config(backend.http().clone(), config);
        Ok(Self::new(backend, artifacts, |feature| config.policy_for(feature)))
    }
}

impl<B> DashboardState<B>
where
    B: JobBackend + ?Sized + 'static,
{
    pub fn new(
        backend: Arc<B>,
        artifacts: ArtifactProbe,
        policy_for: impl Fn(Feature) -> PollPolicy,
    ) -> Self {
        let slot = |feature| FeatureSlot::new(feature, policy_for(feature), Arc::clone(&backend));
        Self {
            coffee_chat: slot(Feature::CoffeeChatPrep),
            interview_prep: slot(Feature::InterviewPrep),
            resume: slot(Feature::ResumeOptimization),
            contacts: slot(Feature::ContactSearch),
            artifacts,
            backend,
        }
    }

    pub fn slot(&self, feature: Feature) -> &FeatureSlot<B> {
        match feature {
            Feature::CoffeeChatPrep => &self.coffee_chat,
            Feature::InterviewPrep => &self.interview_prep,
            Feature::ResumeOptimization => &self.resume,
            Feature::ContactSearch => &self.contacts,
        }
    }

    /// Start `request` on the slot for its feature.
    pub fn start<R: JobRequest>(&self, request: &R) -> Result<Uuid, RequestError> {
        self.slot(R::FEATURE).start(request)
    }

    /// Cancel every active session (page teardown).
    pub fn reset_all(&self) {
        for slot in [&self.coffee_chat, &self.interview_prep, &self.resume, &self.contacts] {
            slot.reset();
        }
    }
}
