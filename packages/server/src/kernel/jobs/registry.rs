//! Job type table the runner dispatches claimed jobs through.
//!
//! Each sync step registers its handler under its `JOB_TYPE`. The handler's
//! outcome is only logged by the handler itself, so the registry drops it
//! and keeps the `SyncError` intact for `classify_error`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

use super::queue::ClaimedJob;
use crate::common::SyncError;
use crate::kernel::ServerDeps;

type StepFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type StepHandler = Box<dyn Fn(&ClaimedJob, Arc<ServerDeps>) -> StepFuture + Send + Sync>;

#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, StepHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route jobs of `job_type` to `handler`, decoding their args as `J`.
    pub fn register<J, T, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        J: DeserializeOwned + Send + 'static,
        F: Fn(J, Arc<ServerDeps>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let step: StepHandler = Box::new(
            move |claimed: &ClaimedJob, deps: Arc<ServerDeps>| -> StepFuture {
                match claimed.deserialize::<J>() {
                    Ok(job) => {
                        let fut = handler(job, deps);
                        Box::pin(async move {
                            fut.await?;
                            Ok(())
                        })
                    }
                    Err(e) => Box::pin(async move { Err(e) }),
                }
            },
        );

        self.handlers.insert(job_type, step);
    }

    pub async fn execute(&self, job: &ClaimedJob, deps: Arc<ServerDeps>) -> Result<()> {
        let handler = self
            .handlers
            .get(job.command_type())
            .ok_or_else(|| anyhow!("Unknown job type: {}", job.command_type()))?;
        handler(job, deps).await
    }

    pub fn job_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

pub type SharedJobRegistry = Arc<JobRegistry>;
