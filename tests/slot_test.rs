//! Feature-slot behavior: superseding sessions, reset, and per-feature isolation.

mod fixtures;
mod helpers;

use std::time::Duration;

use fixtures::*;
use helpers::*;
use outreach_poller::app_state::DashboardState;
use outreach_poller::models::feature::{Feature, PollPolicy};
use outreach_poller::models::job::{JobId, JobUpdate};
use outreach_poller::models::request::{CoffeeChatPrepRequest, RequestError};
use outreach_poller::models::result::{ContactSearchResults, JobPayload};
use outreach_poller::services::artifact::ArtifactProbe;
use outreach_poller::services::session::{FeatureSlot, UiState};

fn policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(2), 60)
}

#[tokio::test(start_paused = true)]
async fn test_new_session_supersedes_in_flight_one() {
    let (hold, release_old) = held();
    let backend = ScriptedBackend::new()
        .accept("job-old", vec![hold])
        .accept(
            "job-new",
            vec![pending("generating_pdf"), completed(coffee_chat_result("https://files.example.com/new.pdf"))],
        )
        .into_arc();
    let slot = FeatureSlot::new(Feature::CoffeeChatPrep, policy(), backend.clone());

    let first = slot.start(&coffee_chat_request()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(slot.snapshot().job_id, Some(JobId::new("job-old")));
    assert_eq!(backend.poll_count("job-old"), 1);

    let second = slot.start(&coffee_chat_request()).unwrap();
    assert_ne!(first, second);

    // The old job's response lands after the new session started
    let _ = release_old.send(JobUpdate::Completed(JobPayload::new(coffee_chat_result(
        "https://files.example.com/old.pdf",
    ))));

    let view = slot.wait_terminal().await.expect("new session should finish");
    assert_eq!(view.session_id, Some(second));
    assert_eq!(view.job_id, Some(JobId::new("job-new")));
    assert_eq!(view.state, UiState::Completed);
    assert_eq!(
        view.result.as_ref().and_then(|r| r.artifact_url()),
        Some("https://files.example.com/new.pdf")
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(slot.snapshot(), view);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_leaves_running_session_alone() {
    let backend = ScriptedBackend::new().accept("job-1", vec![]).into_arc();
    let slot = FeatureSlot::new(Feature::CoffeeChatPrep, policy(), backend.clone());

    let session = slot.start(&coffee_chat_request()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let bad = CoffeeChatPrepRequest {
        linkedin_url: "https://example.com/not-a-profile".to_string(),
    };
    assert!(matches!(slot.start(&bad), Err(RequestError::Invalid(_))));

    let view = slot.snapshot();
    assert_eq!(view.session_id, Some(session));
    assert_eq!(view.state, UiState::Polling);
    assert_eq!(backend.submitted_bodies().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_and_returns_to_idle() {
    let backend = ScriptedBackend::new().accept("job-1", vec![]).into_arc();
    let slot = FeatureSlot::new(Feature::CoffeeChatPrep, policy(), backend.clone());

    slot.start(&coffee_chat_request()).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(slot.snapshot().is_loading());

    slot.reset();
    let polls = backend.poll_count("job-1");
    assert_eq!(slot.snapshot().state, UiState::Idle);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.poll_count("job-1"), polls);
    assert_eq!(slot.snapshot().state, UiState::Idle);
    assert!(slot.wait_terminal().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_views_never_show_loading_with_result() {
    let backend = ScriptedBackend::new()
        .accept(
            "job-1",
            vec![pending("enriching_profile"), pending("generating_pdf"), completed(coffee_chat_result(PDF_URL))],
        )
        .into_arc();
    let slot = FeatureSlot::new(Feature::CoffeeChatPrep, policy(), backend);
    let mut rx = slot.subscribe();

    slot.start(&coffee_chat_request()).unwrap();

    let mut seen = Vec::new();
    loop {
        let view = rx.borrow_and_update().clone();
        seen.push(view.clone());
        if view.state.is_terminal() {
            break;
        }
        rx.changed().await.unwrap();
    }

    for view in &seen {
        assert_eq!(view.result.is_some(), view.state == UiState::Completed, "{:?}", view);
        assert_eq!(view.error.is_some(), view.state == UiState::Failed, "{:?}", view);
        if view.is_loading() {
            assert!(view.result.is_none());
        }
    }
    assert_eq!(seen.last().unwrap().state, UiState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_surfaces_in_view() {
    let backend = ScriptedBackend::new().accept("job-1", vec![]).into_arc();
    let slot = FeatureSlot::new(
        Feature::ResumeOptimization,
        PollPolicy::new(Duration::from_secs(2), 3),
        backend,
    );

    let request = outreach_poller::models::request::ResumeOptimizationRequest {
        job_title: "Data Engineer".to_string(),
        company: "Acme".to_string(),
        job_url: None,
        job_description: None,
        resume: None,
    };
    slot.start(&request).unwrap();

    let view = slot.wait_terminal().await.unwrap();
    assert_eq!(view.state, UiState::Failed);
    assert_eq!(view.error.as_deref(), Some("Generation timed out"));
    assert_eq!(view.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_slots_are_independent() {
    let (hold, _keep_open) = held();
    let backend = ScriptedBackend::new()
        .accept("chat-1", vec![hold])
        .accept("search-1", vec![pending("searching_contacts"), completed(contact_search_result())])
        .into_arc();
    let dashboard = DashboardState::new(
        backend.clone(),
        ArtifactProbe::new(reqwest::Client::new(), 1, Duration::from_millis(1)),
        |feature| feature.default_policy(),
    );

    dashboard.start(&coffee_chat_request()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    dashboard.start(&contact_search_request()).unwrap();

    let view = dashboard.contacts.wait_terminal().await.unwrap();
    let results: ContactSearchResults = view.result.unwrap().parse().unwrap();
    assert_eq!(results.contacts.len(), 2);
    assert_eq!(results.contacts[0].full_name(), "Grace Hopper");

    // Coffee chat is still waiting on its own job
    let chat = dashboard.slot(Feature::CoffeeChatPrep).snapshot();
    assert_eq!(chat.state, UiState::Polling);
    assert_eq!(chat.job_id, Some(JobId::new("chat-1")));

    dashboard.reset_all();
    assert_eq!(dashboard.coffee_chat.snapshot().state, UiState::Idle);
    assert_eq!(dashboard.contacts.snapshot().state, UiState::Idle);
}
