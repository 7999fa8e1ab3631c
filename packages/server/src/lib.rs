// Slack Workspace Sync - API Core
//
// Mirrors users, channels and message history of installed Slack workspaces
// into Postgres. Scheduled passes claim due records and enqueue jobs; the job
// runner executes one page per job and chains continuations.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
