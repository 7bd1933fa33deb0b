use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use outreach_poller::{
    app_state::DashboardState,
    config::ClientConfig,
    models::{
        feature::Feature,
        request::{
            CoffeeChatPrepRequest, ContactSearchRequest, InterviewPrepRequest, JobRequest,
            ResumeFile, ResumeOptimizationRequest,
        },
    },
    services::{backend::HttpBackend, session::UiState},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: outreach-poller <feature> <request.json> [resume.pdf]\n\
    features: coffee-chat-prep, interview-prep, resume-optimization, contact-search";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "outreach-poller failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one session to completion. Returns whether the job completed.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (feature, request_path) = match args.as_slice() {
        [feature, request, ..] => (Feature::from_str(feature).map_err(|_| USAGE)?, request),
        _ => return Err(USAGE.into()),
    };
    let resume_path = args.get(2);

    let config = ClientConfig::from_env()?;
    tracing::info!(api = %config.api_base_url, feature = %feature, "Starting outreach-poller");

    let state = DashboardState::from_config(&config)?;
    let request_json = std::fs::read_to_string(request_path)?;

    match feature {
        Feature::CoffeeChatPrep => {
            start(&state, &serde_json::from_str::<CoffeeChatPrepRequest>(&request_json)?)?
        }
        Feature::InterviewPrep => {
            start(&state, &serde_json::from_str::<InterviewPrepRequest>(&request_json)?)?
        }
        Feature::ContactSearch => {
            start(&state, &serde_json::from_str::<ContactSearchRequest>(&request_json)?)?
        }
        Feature::ResumeOptimization => {
            let mut request: ResumeOptimizationRequest = serde_json::from_str(&request_json)?;
            if let Some(path) = resume_path {
                request.resume = Some(read_resume(Path::new(path))?);
            }
            start(&state, &request)?
        }
    }

    let slot = state.slot(feature);
    let shutdown = CancellationToken::new();
    let mut views = slot.subscribe();

    let view = loop {
        let view = views.borrow_and_update().clone();
        tracing::info!(
            state = ?view.state,
            job_id = ?view.job_id,
            attempts = view.attempts,
            progress = view.message.as_deref().unwrap_or(""),
            "Session update"
        );
        if view.state.is_terminal() {
            break view;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling session");
                shutdown.cancel();
                state.reset_all();
                return Ok(false);
            }
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(false);
                }
            }
        }
    };

    if view.state == UiState::Failed {
        eprintln!("{}", view.error.as_deref().unwrap_or("Generation failed"));
        return Ok(false);
    }

    let Some(result) = view.result else {
        return Ok(false);
    };

    if let Some(url) = result.artifact_url() {
        let url = state.backend.resolve_url(url)?;
        tracing::info!(url = %url, "Waiting for artifact");
        state.artifacts.wait_until_ready(url.as_str(), &shutdown).await?;
    }

    println!("{}", serde_json::to_string_pretty(result.as_value())?);
    Ok(true)
}

fn start<R: JobRequest>(
    state: &DashboardState<HttpBackend>,
    request: &R,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_id = state.start(request)?;
    tracing::info!(session_id = %session_id, feature = %R::FEATURE, "Session started");
    Ok(())
}

fn read_resume(path: &Path) -> Result<ResumeFile, Box<dyn std::error::Error>> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("resume path has no file name")?
        .to_string();
    Ok(ResumeFile {
        file_name,
        bytes: std::fs::read(path)?,
    })
}
