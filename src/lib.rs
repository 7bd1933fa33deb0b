//! Outreach job poller
//!
//! Client-side driver for the recruiting-outreach backend's long-running
//! generation jobs (coffee chat prep, interview prep, resume optimization,
//! contact search): submit a request, poll its status until it completes,
//! fails, or times out, and publish UI-observable session state along the way.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
