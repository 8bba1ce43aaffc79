//! Code executed inside a worker thread.
//!
//! # Lifecycle
//! ```text
//! Spawned → AwaitingConfig → Serving → AwaitingShutdown → Closing → Terminated
//! ```
//!
//! # Design Decisions
//! - Each worker owns a current-thread Tokio runtime; its listener and every
//!   connection task live and die with it
//! - Close failures are reported to the coordinator, never raised locally
//! - Losing the coordinator while serving counts as a forced shutdown
//! - A forced command arriving during a graceful close drops the remaining
//!   connections instead of waiting for them

use crate::http::handle::ServerHandle;
use crate::http::proxy::ProxyServer;
use crate::observability::metrics;
use crate::worker::channel::{self, Outbox};
use crate::worker::message::{FromWorker, ShutdownOutcome, ToWorker};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Spawned,
    AwaitingConfig,
    Serving,
    AwaitingShutdown,
    Closing,
    Terminated,
}

/// Thread entry point for worker `index`. Returns once the worker has terminated.
pub fn run(index: usize, parent: Outbox<FromWorker>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(instance = index, error = %e, "Failed to build worker runtime");
            let _ = parent.send(FromWorker::StartFailed { error: e.to_string() });
            return;
        }
    };

    let mut worker = WorkerRuntime::new(index, parent);
    runtime.block_on(worker.serve());

    // Dropping the runtime tears down anything the worker left running.
    drop(runtime);
    worker.transition(WorkerState::Terminated);
}

struct WorkerRuntime {
    index: usize,
    state: WorkerState,
    parent: Outbox<FromWorker>,
}

impl WorkerRuntime {
    fn new(index: usize, parent: Outbox<FromWorker>) -> Self {
        Self {
            index,
            state: WorkerState::Spawned,
            parent,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::debug!(instance = self.index, from = ?self.state, to = ?next, "Worker state change");
        self.state = next;
    }

    async fn serve(&mut self) {
        let (outbox, mut inbox) = channel::pair();
        if self.parent.send(FromWorker::Endpoint(outbox)).is_err() {
            return;
        }
        self.transition(WorkerState::AwaitingConfig);

        let config = match inbox.next().await {
            Ok(ToWorker::Configure(config)) => config,
            Ok(ToWorker::Shutdown { .. }) => {
                let _ = self.parent.send(FromWorker::Closed(ShutdownOutcome::Success));
                return;
            }
            Err(_) => return,
        };

        self.transition(WorkerState::Serving);
        let server = match ProxyServer::create(config).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(instance = self.index, error = %e, "Worker failed to start");
                let _ = self.parent.send(FromWorker::StartFailed { error: e.to_string() });
                return;
            }
        };

        if self
            .parent
            .send(FromWorker::Started {
                addr: server.local_addr(),
            })
            .is_err()
        {
            let _ = server.close(true).await;
            return;
        }

        let force = loop {
            match inbox.next().await {
                Ok(ToWorker::Shutdown { force }) => break force,
                Ok(ToWorker::Configure(_)) => {
                    tracing::warn!(instance = self.index, "Ignoring configuration for a running worker");
                }
                Err(_) => {
                    tracing::warn!(instance = self.index, "Coordinator went away, forcing shutdown");
                    break true;
                }
            }
        };

        self.transition(WorkerState::AwaitingShutdown);
        self.transition(WorkerState::Closing);

        let result = {
            let close = server.close(force);
            tokio::pin!(close);
            let mut listening = !force;

            loop {
                tokio::select! {
                    result = &mut close => break result,
                    command = inbox.next(), if listening => match command {
                        Ok(ToWorker::Shutdown { force: true }) => {
                            tracing::info!(instance = self.index, "Escalating to a forced shutdown");
                            listening = false;
                            if let Err(e) = server.inner().close(true).await {
                                tracing::warn!(instance = self.index, error = %e, "Forced close failed");
                            }
                        }
                        Ok(_) => {}
                        Err(_) => listening = false,
                    },
                }
            }
        };

        let outcome = match result {
            Ok(()) => ShutdownOutcome::Success,
            Err(e) => {
                tracing::warn!(instance = self.index, error = %e, "Worker close failed");
                ShutdownOutcome::failure(&e)
            }
        };

        metrics::record_worker_shutdown(outcome.is_success());
        let _ = self.parent.send(FromWorker::Closed(outcome));
    }
}
