pub mod channel;
pub mod message;
pub mod user;

pub use channel::Channel;
pub use message::Message;
pub use user::SlackUser;
