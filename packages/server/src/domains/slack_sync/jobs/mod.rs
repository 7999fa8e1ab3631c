mod collect_messages;
mod sync_channels;
mod sync_users;

pub use collect_messages::CollectMessagesJob;
pub use sync_channels::SyncChannelsJob;
pub use sync_users::SyncUsersJob;
