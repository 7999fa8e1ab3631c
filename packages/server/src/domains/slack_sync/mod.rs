//! Incremental sync of users, channels and message history.
//!
//! Every step is stateless: progress lives in the store (channel watermarks,
//! synced-at stamps) and in the parameters of the next queued job.

pub mod actions;
pub mod effects;
pub mod jobs;
pub mod models;

pub use crate::common::SyncError;
