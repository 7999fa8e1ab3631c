pub mod authorization;
pub mod workspace;

pub use authorization::{Authorization, AuthorizationUpdate};
pub use workspace::{SyncResource, Workspace};
