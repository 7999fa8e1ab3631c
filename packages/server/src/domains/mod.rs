// Business domains
pub mod slack_sync;
pub mod workspace;
