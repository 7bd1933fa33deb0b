//! Submit-then-poll driver for long-running backend jobs.
//!
//! A session submits one request, then checks the job's status at a fixed
//! interval until the backend reports a terminal state or the attempt ceiling
//! is reached. Each session runs as a single tokio task; a status check is only
//! scheduled after the previous one has been handled, so requests never overlap.
//!
//! Every callback is delivered through a per-session gate. Cancelling a
//! [`PollHandle`] closes the gate, and the first terminal callback closes it
//! too, so a session produces exactly one of `on_complete` / `on_failure` and
//! nothing at all once `cancel()` has returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::feature::{Feature, PollPolicy};
use crate::models::job::{JobId, JobUpdate};
use crate::models::request::RequestBody;
use crate::models::result::JobPayload;
use crate::services::backend::{BackendError, JobBackend};
use crate::services::progress::progress_message;

/// Message for the client-side attempt ceiling.
pub const TIMEOUT_MESSAGE: &str = "Generation timed out";

/// Latest non-terminal status of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub attempt: u32,
    pub max_attempts: u32,
    /// Raw stage label from the backend, if any.
    pub status: Option<String>,
    /// Human-readable message for `status`.
    pub message: &'static str,
}

/// Why a session ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollFailure {
    /// Backend refused the submission (bad input, insufficient credits).
    #[error("{0}")]
    Rejected(String),

    /// Job reached the backend's `failed` status.
    #[error("{0}")]
    Backend(String),

    /// Attempt ceiling reached without a terminal status.
    #[error("Generation timed out")]
    TimedOut { attempts: u32 },

    #[error("Network error: {0}")]
    Network(String),
}

impl PollFailure {
    /// User-facing message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PollFailure::Rejected(_) => "rejected",
            PollFailure::Backend(_) => "backend",
            PollFailure::TimedOut { .. } => "timeout",
            PollFailure::Network(_) => "network",
        }
    }

    fn from_submit_error(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { message, .. } => PollFailure::Rejected(message),
            other => PollFailure::Network(other.to_string()),
        }
    }
}

/// Receives the lifecycle of one session.
///
/// Callbacks run on the session's task while its gate is held, so keep them
/// short. Cancelling the same session from inside one is allowed: the running
/// callback finishes and nothing fires after it.
pub trait PollObserver: Send + Sync {
    /// The backend accepted the request and assigned `job_id`.
    fn on_submitted(&self, _job_id: &JobId) {}

    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn on_complete(&self, result: &JobPayload);

    fn on_failure(&self, failure: &PollFailure);
}

/// Open/closed latch shared by a session task and its handle.
///
/// `delivery` serializes callbacks against `close`, so once `close` returns no
/// callback is running or will run. `delivering_on` lets a callback close its
/// own session without waiting on itself.
#[derive(Debug)]
struct SessionGate {
    open: AtomicBool,
    delivery: Mutex<()>,
    delivering_on: Mutex<Option<ThreadId>>,
}

impl SessionGate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            delivery: Mutex::new(()),
            delivering_on: Mutex::new(None),
        }
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delivering_on(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.delivering_on.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run_callback(&self, f: impl FnOnce()) {
        *self.delivering_on() = Some(thread::current().id());
        f();
        *self.delivering_on() = None;
    }

    /// Run `f` only if the session is still live.
    fn deliver(&self, f: impl FnOnce()) -> bool {
        let _delivery = self.lock_delivery();
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        self.run_callback(f);
        true
    }

    /// Run the terminal callback `f` at most once, closing the gate.
    fn finish(&self, f: impl FnOnce()) -> bool {
        let _delivery = self.lock_delivery();
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.run_callback(f);
        true
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        if *self.delivering_on() == Some(thread::current().id()) {
            // Closed from inside this session's own callback
            return;
        }
        // Wait out a callback running on another thread
        drop(self.lock_delivery());
    }
}

/// Cancellation handle for one running session.
///
/// Dropping the handle without [`PollHandle::join`] cancels the session.
#[derive(Debug)]
pub struct PollHandle {
    session_id: Uuid,
    gate: Arc<SessionGate>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Stop polling. No callback fires after this returns.
    pub fn cancel(&self) {
        self.gate.close();
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the session task to exit (terminal state or cancellation).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(session_id = %self.session_id, error = %e, "Poll task aborted");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel();
        }
    }
}

/// Drives submit-then-poll sessions against a [`JobBackend`].
pub struct Poller<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for Poller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B> Poller<B>
where
    B: JobBackend + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Start a new session with a fresh session id. Must be called within a tokio runtime.
    pub fn run(
        &self,
        feature: Feature,
        body: RequestBody,
        policy: PollPolicy,
        observer: Arc<dyn PollObserver>,
    ) -> PollHandle {
        self.run_session(Uuid::new_v4(), feature, body, policy, observer)
    }

    /// Start a new session under a caller-chosen session id.
    pub fn run_session(
        &self,
        session_id: Uuid,
        feature: Feature,
        body: RequestBody,
        policy: PollPolicy,
        observer: Arc<dyn PollObserver>,
    ) -> PollHandle {
        let gate = Arc::new(SessionGate::new());
        let token = CancellationToken::new();

        let session = Session {
            id: session_id,
            feature,
            policy,
            backend: Arc::clone(&self.backend),
            observer,
            gate: Arc::clone(&gate),
            token: token.clone(),
        };

        metrics::counter!("poll_sessions_started_total", "feature" => feature.path()).increment(1);

        let task = tokio::spawn(session.drive(body));

        PollHandle {
            session_id,
            gate,
            token,
            task: Some(task),
        }
    }
}

struct Session<B: ?Sized> {
    id: Uuid,
    feature: Feature,
    policy: PollPolicy,
    backend: Arc<B>,
    observer: Arc<dyn PollObserver>,
    gate: Arc<SessionGate>,
    token: CancellationToken,
}

impl<B> Session<B>
where
    B: JobBackend + ?Sized,
{
    async fn drive(self, body: RequestBody) {
        let started = Instant::now();

        tracing::info!(
            session_id = %self.id,
            feature = %self.feature,
            max_attempts = self.policy.max_attempts,
            interval_ms = self.policy.interval.as_millis() as u64,
            "Submitting generation job"
        );

        let submitted = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::info!(session_id = %self.id, "Session cancelled during submission");
                return;
            }
            result = self.backend.submit(self.feature, &body) => result,
        };

        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::warn!(session_id = %self.id, feature = %self.feature, error = %e, "Job submission failed");
                self.fail(PollFailure::from_submit_error(e), started);
                return;
            }
        };

        tracing::info!(session_id = %self.id, feature = %self.feature, job_id = %job_id, "Job accepted, polling for status");

        if !self.gate.deliver(|| self.observer.on_submitted(&job_id)) {
            return;
        }

        self.poll_until_terminal(&job_id, started).await;
    }

    async fn poll_until_terminal(&self, job_id: &JobId, started: Instant) {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 0u32;
        let mut consecutive_errors = 0u32;

        loop {
            attempt += 1;

            let polled = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::info!(session_id = %self.id, job_id = %job_id, attempt, "Session cancelled while polling");
                    return;
                }
                result = self.backend.poll_once(self.feature, job_id) => result,
            };

            match polled {
                Ok(JobUpdate::Completed(payload)) => {
                    self.complete(job_id, payload, attempt, started);
                    return;
                }
                Ok(JobUpdate::Failed(message)) => {
                    tracing::warn!(session_id = %self.id, job_id = %job_id, attempt, error = %message, "Backend reported job failure");
                    self.fail(PollFailure::Backend(message), started);
                    return;
                }
                Ok(JobUpdate::Pending(status)) => {
                    consecutive_errors = 0;
                    let update = ProgressUpdate {
                        attempt,
                        max_attempts,
                        message: progress_message(status.as_deref()),
                        status,
                    };
                    tracing::debug!(
                        session_id = %self.id,
                        job_id = %job_id,
                        attempt,
                        status = update.status.as_deref().unwrap_or("<none>"),
                        "Job still running"
                    );
                    if !self.gate.deliver(|| self.observer.on_progress(&update)) {
                        return;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.policy.transient_error_tolerance {
                        tracing::error!(session_id = %self.id, job_id = %job_id, attempt, error = %e, "Status check failed");
                        self.fail(PollFailure::Network(e.to_string()), started);
                        return;
                    }
                    tracing::warn!(
                        session_id = %self.id,
                        job_id = %job_id,
                        attempt,
                        consecutive_errors,
                        error = %e,
                        "Status check failed, will retry"
                    );
                }
            }

            if attempt >= max_attempts {
                tracing::warn!(session_id = %self.id, job_id = %job_id, attempts = attempt, "Job did not finish before attempt ceiling");
                self.fail(PollFailure::TimedOut { attempts: attempt }, started);
                return;
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }

    fn complete(&self, job_id: &JobId, payload: JobPayload, attempts: u32, started: Instant) {
        let delivered = self.gate.finish(|| self.observer.on_complete(&payload));
        if delivered {
            metrics::counter!("poll_sessions_completed_total", "feature" => self.feature.path()).increment(1);
            metrics::histogram!("poll_session_seconds", "feature" => self.feature.path())
                .record(started.elapsed().as_secs_f64());
            tracing::info!(
                session_id = %self.id,
                job_id = %job_id,
                attempts,
                duration_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            );
        }
    }

    fn fail(&self, failure: PollFailure, started: Instant) {
        let delivered = self.gate.finish(|| self.observer.on_failure(&failure));
        if delivered {
            metrics::counter!(
                "poll_sessions_failed_total",
                "feature" => self.feature.path(),
                "reason" => failure.reason()
            )
            .increment(1);
            metrics::histogram!("poll_session_seconds", "feature" => self.feature.path())
                .record(started.elapsed().as_secs_f64());
        }
    }
}
