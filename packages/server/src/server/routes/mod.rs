// HTTP routes
pub mod health;
pub mod jobs;
pub mod scheduler;

pub use health::*;
pub use jobs::*;
pub use scheduler::*;
