//! Messages exchanged over a worker link.

use std::backtrace::Backtrace;
use std::net::SocketAddr;

use crate::http::options::ServeConfig;
use crate::worker::channel::Outbox;

/// Coordinator → worker.
#[derive(Debug)]
pub enum ToWorker {
    /// Start serving with this configuration. Sent exactly once.
    Configure(ServeConfig),
    /// Close the worker's server and terminate.
    Shutdown { force: bool },
}

/// Worker → coordinator.
#[derive(Debug)]
pub enum FromWorker {
    /// Handshake: where to send commands.
    Endpoint(Outbox<ToWorker>),
    /// The worker's listener is bound.
    Started { addr: SocketAddr },
    /// The worker could not start; it has already terminated.
    StartFailed { error: String },
    /// Result of a shutdown request.
    Closed(ShutdownOutcome),
}

/// How a worker's close went. Plain data so it can leave the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Success,
    Failure { error: String, stack_trace: String },
}

impl ShutdownOutcome {
    /// Capture `error` and the current stack, regardless of `RUST_BACKTRACE`.
    pub fn failure(error: &dyn std::error::Error) -> Self {
        ShutdownOutcome::Failure {
            error: error.to_string(),
            stack_trace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ShutdownOutcome::Success)
    }

    /// Turn a failure into an error attributed to worker `instance`.
    pub fn into_result(self, instance: usize) -> Result<(), WorkerShutdownError> {
        match self {
            ShutdownOutcome::Success => Ok(()),
            ShutdownOutcome::Failure { error, stack_trace } => Err(WorkerShutdownError {
                instance,
                message: error,
                stack_trace,
            }),
        }
    }
}

/// A worker's close failed. Carries the worker-side message and stack trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("worker {instance} failed to close: {message}")]
pub struct WorkerShutdownError {
    pub instance: usize,
    pub message: String,
    pub stack_trace: String,
}

impl WorkerShutdownError {
    /// Stack trace captured inside the worker when the close failed.
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_message_and_stack() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let outcome = ShutdownOutcome::failure(&io);
        assert!(!outcome.is_success());

        let err = outcome.into_result(4).unwrap_err();
        assert_eq!(err.instance, 4);
        assert_eq!(err.message, "disk on fire");
        assert_ne!(err.stack_trace(), "disabled backtrace");
        assert!(err.stack_trace().contains("multiserve"), "{}", err.stack_trace());
        assert_eq!(err.to_string(), "worker 4 failed to close: disk on fire");
    }

    #[test]
    fn success_is_ok() {
        assert!(ShutdownOutcome::Success.into_result(1).is_ok());
    }
}
