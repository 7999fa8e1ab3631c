pub mod collect_messages;
pub mod schedule_channel_crawls;
pub mod sync_listing;

pub use collect_messages::{collect_messages, HistoryOutcome};
pub use schedule_channel_crawls::schedule_channel_crawls;
pub use sync_listing::{sync_channels, sync_users, PageOutcome};
