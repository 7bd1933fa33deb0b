//! Test helper utilities: a scripted in-memory backend and a recording observer.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::oneshot;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use outreach_poller::models::feature::Feature;
use outreach_poller::models::job::{JobId, JobUpdate};
use outreach_poller::models::request::RequestBody;
use outreach_poller::models::result::JobPayload;
use outreach_poller::services::backend::{BackendError, JobBackend};
use outreach_poller::services::poller::{PollFailure, PollObserver, ProgressUpdate};

/// One scripted answer to a status check.
pub enum Step {
    Update(JobUpdate),
    /// Transport-level failure (surfaces as `BackendError::Status`).
    Error,
    /// Response held in flight until the sender fires.
    Hold(oneshot::Receiver<JobUpdate>),
}

pub fn pending(label: &str) -> Step {
    Step::Update(JobUpdate::Pending(Some(label.to_string())))
}

pub fn completed(payload: serde_json::Value) -> Step {
    Step::Update(JobUpdate::Completed(JobPayload::new(payload)))
}

pub fn failed(message: &str) -> Step {
    Step::Update(JobUpdate::Failed(message.to_string()))
}

/// Returns a step that blocks until the returned sender is used.
pub fn held() -> (Step, oneshot::Sender<JobUpdate>) {
    let (tx, rx) = oneshot::channel();
    (Step::Hold(rx), tx)
}

/// In-memory backend answering from per-job scripts.
///
/// Once a job's script runs out, every further check answers with the
/// fallback update (`processing` unless overridden).
pub struct ScriptedBackend {
    submissions: Mutex<VecDeque<Result<String, String>>>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Mutex<JobUpdate>,
    submitted_bodies: Mutex<Vec<(Feature, RequestBody)>>,
    polls: Mutex<Vec<(String, Instant)>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(VecDeque::new()),
            scripts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(JobUpdate::Pending(Some("processing".to_string()))),
            submitted_bodies: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
        }
    }

    /// Accept the next submission with `job_id`, answering status checks from `steps`.
    pub fn accept(self, job_id: &str, steps: Vec<Step>) -> Self {
        self.submissions.lock().unwrap().push_back(Ok(job_id.to_string()));
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), steps.into_iter().collect());
        self
    }

    /// Reject the next submission with `message`.
    pub fn reject(self, message: &str) -> Self {
        self.submissions.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn otherwise(self, update: JobUpdate) -> Self {
        *self.fallback.lock().unwrap() = update;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn poll_count(&self, job_id: &str) -> usize {
        self.polls.lock().unwrap().iter().filter(|(id, _)| id == job_id).count()
    }

    pub fn total_polls(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn poll_times(&self, job_id: &str) -> Vec<Instant> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn submitted_bodies(&self) -> Vec<(Feature, RequestBody)> {
        self.submitted_bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn submit(&self, feature: Feature, body: &RequestBody) -> Result<JobId, BackendError> {
        self.submitted_bodies.lock().unwrap().push((feature, body.clone()));
        match self.submissions.lock().unwrap().pop_front() {
            Some(Ok(job_id)) => Ok(JobId::new(job_id)),
            Some(Err(message)) => Err(BackendError::Rejected {
                status: Some(StatusCode::BAD_REQUEST),
                message,
            }),
            None => Err(BackendError::Rejected {
                status: None,
                message: "no scripted submission".to_string(),
            }),
        }
    }

    async fn poll_once(&self, _feature: Feature, job_id: &JobId) -> Result<JobUpdate, BackendError> {
        self.polls
            .lock()
            .unwrap()
            .push((job_id.to_string(), Instant::now()));

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(job_id.as_str())
            .and_then(|steps| steps.pop_front());

        match step {
            Some(Step::Update(update)) => Ok(update),
            Some(Step::Error) => Err(BackendError::Status {
                status: StatusCode::BAD_GATEWAY,
                message: "Bad Gateway".to_string(),
            }),
            Some(Step::Hold(rx)) => rx.await.map_err(|_| BackendError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "held response dropped".to_string(),
            }),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

/// Everything a session reported, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Submitted(JobId),
    Progress(ProgressUpdate),
    Complete(JobPayload),
    Failure(PollFailure),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<ProgressUpdate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Progress(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    /// Number of `on_complete` + `on_failure` calls.
    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Complete(_) | Event::Failure(_)))
            .count()
    }

    pub fn failure(&self) -> Option<PollFailure> {
        self.events().into_iter().find_map(|event| match event {
            Event::Failure(failure) => Some(failure),
            _ => None,
        })
    }

    pub fn result(&self) -> Option<JobPayload> {
        self.events().into_iter().find_map(|event| match event {
            Event::Complete(payload) => Some(payload),
            _ => None,
        })
    }
}

impl PollObserver for RecordingObserver {
    fn on_submitted(&self, job_id: &JobId) {
        self.events.lock().unwrap().push(Event::Submitted(job_id.clone()));
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.events.lock().unwrap().push(Event::Progress(update.clone()));
    }

    fn on_complete(&self, result: &JobPayload) {
        self.events.lock().unwrap().push(Event::Complete(result.clone()));
    }

    fn on_failure(&self, failure: &PollFailure) {
        self.events.lock().unwrap().push(Event::Failure(failure.clone()));
    }
}
