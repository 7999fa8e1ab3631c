//! Connected workspaces: credentials and the refresh schedule.

pub mod actions;
pub mod authorization_cache;
pub mod models;

pub use authorization_cache::AuthorizationCache;
