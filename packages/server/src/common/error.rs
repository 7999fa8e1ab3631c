//! Failure taxonomy for sync steps.
//!
//! Every variant is terminal for the step that produced it. Nothing in the
//! pipeline retries in-process; `error_kind` tells the job queue whether a
//! redelivery can help.

use crate::kernel::jobs::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no authorization for workspace '{0}'")]
    AuthorizationMissing(String),

    #[error("remote api error: {0:#}")]
    RemoteApi(anyhow::Error),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error("enqueue failed: {0:#}")]
    Queue(anyhow::Error),
}

impl SyncError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            SyncError::AuthorizationMissing(_) => ErrorKind::NonRetryable,
            SyncError::RemoteApi(_) | SyncError::Store(_) | SyncError::Queue(_) => {
                ErrorKind::Retryable
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error_kind().should_retry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_authorization_is_not_retried() {
        let err = SyncError::AuthorizationMissing("T1".into());
        assert_eq!(err.error_kind(), ErrorKind::NonRetryable);
        assert_eq!(err.to_string(), "no authorization for workspace 'T1'");
    }

    #[test]
    fn io_failures_are_retryable() {
        assert!(SyncError::RemoteApi(anyhow::anyhow!("timeout")).is_retryable());
        assert!(SyncError::Store(anyhow::anyhow!("connection reset")).is_retryable());
        assert!(SyncError::Queue(anyhow::anyhow!("insert failed")).is_retryable());
    }
}
