//! Kernel module - server infrastructure and dependencies.

pub mod cache;
pub mod deps;
pub mod error_reporting;
pub mod jobs;
pub mod pg_store;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use cache::MemoryCache;
pub use deps::{ServerDeps, SlackAdapter};
pub use error_reporting::TracingErrorReporter;
pub use pg_store::PgSyncStore;
pub use scheduled_tasks::{start_scheduler, ScheduleConfig};
pub use test_dependencies::TestDependencies;
pub use traits::*;
