pub mod artifact;
pub mod backend;
pub mod poller;
pub mod progress;
pub mod session;
