pub mod job_handlers;

pub use job_handlers::{
    handle_collect_messages, handle_sync_channels, handle_sync_users, register_slack_sync_jobs,
};
