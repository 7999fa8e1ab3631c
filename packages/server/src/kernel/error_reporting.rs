use std::fmt::Display;

use super::BaseErrorReporter;

/// Error sink that emits a structured `tracing` event per report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl BaseErrorReporter for TracingErrorReporter {
    fn report(&self, context: &str, error: &dyn Display) {
        tracing::error!(target: "error_reporting", context, error = %error, "reported error");
    }
}
