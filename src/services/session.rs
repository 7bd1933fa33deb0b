//! UI-observable session state for one feature instance.
//!
//! [`FeatureSlot`] owns at most one live poll session. Its [`SessionView`] is
//! published through a `tokio::sync::watch` channel, and every mutation names
//! the session it belongs to: a mutation from a superseded session is dropped
//! instead of applied.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::feature::{Feature, PollPolicy};
use crate::models::job::JobId;
use crate::models::request::{JobRequest, RequestError};
use crate::models::result::JobPayload;
use crate::services::backend::JobBackend;
use crate::services::poller::{PollFailure, PollHandle, PollObserver, Poller, ProgressUpdate};
use crate::services::progress::GENERIC_PROGRESS_MESSAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl UiState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UiState::Completed | UiState::Failed)
    }

    pub fn is_loading(self) -> bool {
        matches!(self, UiState::Submitting | UiState::Polling)
    }
}

/// Snapshot of one feature's session, as a UI would render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Option<Uuid>,
    pub job_id: Option<JobId>,
    pub state: UiState,
    pub status: Option<String>,
    pub message: Option<String>,
    pub attempts: u32,
    pub result: Option<JobPayload>,
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<PollFailure>,
    pub updated_at: DateTime<Utc>,
}

impl SessionView {
    pub fn idle() -> Self {
        Self {
            session_id: None,
            job_id: None,
            state: UiState::Idle,
            status: None,
            message: None,
            attempts: 0,
            result: None,
            error: None,
            failure: None,
            updated_at: Utc::now(),
        }
    }

    fn submitting(session_id: Uuid) -> Self {
        Self {
            session_id: Some(session_id),
            state: UiState::Submitting,
            message: Some("Submitting...".to_string()),
            ..Self::idle()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// True if this view belongs to `session_id` and, once a job id is bound, to `job_id`.
    fn is_owned_by(&self, session_id: Uuid, job_id: Option<&JobId>) -> bool {
        if self.session_id != Some(session_id) {
            return false;
        }
        match (&self.job_id, job_id) {
            (Some(active), Some(incoming)) => active == incoming,
            _ => true,
        }
    }
}

/// Commits one session's callbacks into the shared view.
struct ViewObserver {
    session_id: Uuid,
    job_id: Mutex<Option<JobId>>,
    view: Arc<watch::Sender<SessionView>>,
}

impl ViewObserver {
    fn job_id(&self) -> MutexGuard<'_, Option<JobId>> {
        self.job_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `update` only if the view still belongs to this session.
    fn commit(&self, update: impl FnOnce(&mut SessionView)) {
        let job_id = self.job_id().clone();
        let applied = self.view.send_if_modified(|view| {
            if !view.is_owned_by(self.session_id, job_id.as_ref()) {
                return false;
            }
            update(view);
            view.updated_at = Utc::now();
            true
        });

        if !applied {
            tracing::debug!(
                session_id = %self.session_id,
                job_id = ?job_id,
                "Dropped update from superseded session"
            );
        }
    }
}

impl PollObserver for ViewObserver {
    fn on_submitted(&self, job_id: &JobId) {
        // Ownership is checked against the session id alone until the job id is bound.
        self.commit(|view| {
            view.job_id = Some(job_id.clone());
            view.state = UiState::Polling;
            view.message = Some(GENERIC_PROGRESS_MESSAGE.to_string());
        });
        *self.job_id() = Some(job_id.clone());
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.commit(|view| {
            view.state = UiState::Polling;
            view.status = update.status.clone();
            view.message = Some(update.message.to_string());
            view.attempts = update.attempt;
        });
    }

    fn on_complete(&self, result: &JobPayload) {
        self.commit(|view| {
            view.state = UiState::Completed;
            view.status = Some("completed".to_string());
            view.message = None;
            view.result = Some(result.clone());
            view.error = None;
            view.failure = None;
        });
    }

    fn on_failure(&self, failure: &PollFailure) {
        self.commit(|view| {
            view.state = UiState::Failed;
            view.message = None;
            view.result = None;
            view.error = Some(failure.message());
            view.failure = Some(failure.clone());
        });
    }
}

/// One feature instance: at most one active session at a time.
pub struct FeatureSlot<B: ?Sized> {
    feature: Feature,
    policy: PollPolicy,
    poller: Poller<B>,
    view: Arc<watch::Sender<SessionView>>,
    current: Mutex<Option<PollHandle>>,
}

impl<B> FeatureSlot<B>
where
    B: JobBackend + ?Sized + 'static,
{
    pub fn new(feature: Feature, policy: PollPolicy, backend: Arc<B>) -> Self {
        let (view, _) = watch::channel(SessionView::idle());
        Self {
            feature,
            policy,
            poller: Poller::new(backend),
            view: Arc::new(view),
            current: Mutex::new(None),
        }
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> SessionView {
        self.view.borrow().clone()
    }

    fn current(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate `request` and start a session for it, superseding any running one.
    ///
    /// Invalid input is returned as an error and leaves the current session untouched.
    pub fn start<R: JobRequest>(&self, request: &R) -> Result<Uuid, RequestError> {
        debug_assert_eq!(R::FEATURE, self.feature, "request routed to the wrong slot");
        let body = request.prepare()?;

        let mut current = self.current();
        if let Some(previous) = current.take() {
            tracing::info!(
                feature = %self.feature,
                session_id = %previous.session_id(),
                "Superseding active session"
            );
            previous.cancel();
        }

        let session_id = Uuid::new_v4();
        self.view.send_replace(SessionView::submitting(session_id));

        let observer = Arc::new(ViewObserver {
            session_id,
            job_id: Mutex::new(None),
            view: Arc::clone(&self.view),
        });
        let handle = self
            .poller
            .run_session(session_id, self.feature, body, self.policy, observer);
        *current = Some(handle);

        Ok(session_id)
    }

    /// Cancel the active session (if any) and return to idle.
    pub fn reset(&self) {
        if let Some(handle) = self.current().take() {
            handle.cancel();
        }
        self.view.send_replace(SessionView::idle());
    }

    /// Wait until the current session reaches `Completed` or `Failed`.
    ///
    /// Returns `None` if the slot is idle or is reset while waiting.
    pub async fn wait_terminal(&self) -> Option<SessionView> {
        let mut rx = self.subscribe();
        let session_id = rx.borrow().session_id?;

        let view = rx
            .wait_for(|view| view.session_id != Some(session_id) || view.state.is_terminal())
            .await
            .ok()?
            .clone();

        (view.session_id == Some(session_id)).then_some(view)
    }
}

impl<B: ?Sized> Drop for FeatureSlot<B> {
    fn drop(&mut self) {
        let current = self.current.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = current.take() {
            handle.cancel();
        }
    }
}
