pub mod dispatch;
pub mod error;
pub mod message_ts;

pub use dispatch::DispatchSummary;
pub use error::SyncError;
pub use message_ts::{InvalidMessageTs, MessageTs};
