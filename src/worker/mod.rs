//! Worker subsystem: isolated serving contexts driven by messages.
//!
//! # Data Flow
//! ```text
//! coordinator                           worker thread (runtime.rs)
//!     spawn thread ───────────────────▶ create command channel
//!     ◀──────────── Endpoint(outbox) ── handshake
//!     Configure(ServeConfig) ─────────▶ bind shared listener
//!     ◀──────────── Started { addr } ── serving
//!     Shutdown { force } ─────────────▶ close(force)
//!     ◀──────────── Closed(outcome) ─── terminate
//! ```
//!
//! # Design Decisions
//! - Nothing is shared with a worker except what crosses the channel
//! - One [`WorkerHandle`] per worker, owned by the coordinator
//! - Commands go through a cloneable [`WorkerSignal`], so a forced shutdown
//!   can still reach a worker whose outcome another task is awaiting

pub mod channel;
pub mod message;
pub mod runtime;

use std::net::SocketAddr;
use std::thread;

use crate::http::options::ServeConfig;
use self::channel::{ChannelError, Inbox, Outbox};
use self::message::{FromWorker, ShutdownOutcome, ToWorker};

pub use self::message::WorkerShutdownError;

/// Errors starting a worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("worker {instance} failed to start: {error}")]
    Start { instance: usize, error: String },

    #[error("worker {instance} sent an unexpected {message} message")]
    Protocol { instance: usize, message: &'static str },
}

fn unexpected(instance: usize, message: &FromWorker) -> WorkerError {
    let message = match message {
        FromWorker::Endpoint(_) => "endpoint",
        FromWorker::Started { .. } => "started",
        FromWorker::StartFailed { .. } => "start-failed",
        FromWorker::Closed(_) => "closed",
    };
    WorkerError::Protocol { instance, message }
}

/// The coordinator's link to one running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    index: usize,
    local_addr: SocketAddr,
    outbox: Outbox<ToWorker>,
    inbox: Inbox<FromWorker>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker, hand it `config`, and wait until it is serving.
    pub async fn spawn(config: ServeConfig) -> Result<Self, WorkerError> {
        let index = config.instance_index;
        let (parent, mut inbox) = channel::pair();

        let thread = thread::Builder::new()
            .name(format!("multiserve-worker-{index}"))
            .spawn(move || runtime::run(index, parent))?;

        let outbox = match inbox.next().await? {
            FromWorker::Endpoint(outbox) => outbox,
            FromWorker::StartFailed { error } => return Err(WorkerError::Start { instance: index, error }),
            other => return Err(unexpected(index, &other)),
        };

        outbox.send(ToWorker::Configure(config))?;

        let local_addr = match inbox.next().await? {
            FromWorker::Started { addr } => addr,
            FromWorker::StartFailed { error } => return Err(WorkerError::Start { instance: index, error }),
            other => return Err(unexpected(index, &other)),
        };

        tracing::info!(instance = index, address = %local_addr, "Worker started");

        Ok(Self {
            index,
            local_addr,
            outbox,
            inbox,
            thread: Some(thread),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Address the worker's listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A sender of shutdown commands to this worker.
    pub fn signal(&self) -> WorkerSignal {
        WorkerSignal {
            index: self.index,
            outbox: self.outbox.clone(),
        }
    }

    /// Wait for the worker's shutdown outcome and for its thread to exit.
    pub async fn outcome(mut self) -> Result<ShutdownOutcome, ChannelError> {
        let outcome = loop {
            match self.inbox.next().await? {
                FromWorker::Closed(outcome) => break outcome,
                other => {
                    tracing::warn!(instance = self.index, received = ?other, "Unexpected worker message while closing");
                }
            }
        };

        if let Some(thread) = self.thread.take() {
            if tokio::task::spawn_blocking(move || thread.join()).await.is_err() {
                tracing::warn!(instance = self.index, "Worker thread did not exit cleanly");
            }
        }

        Ok(outcome)
    }
}

/// Sends shutdown commands to one worker.
///
/// A worker closing gracefully still accepts a forced command and drops its
/// remaining connections.
#[derive(Debug, Clone)]
pub struct WorkerSignal {
    index: usize,
    outbox: Outbox<ToWorker>,
}

impl WorkerSignal {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Ask the worker to close. Fails once the worker has terminated.
    pub fn shutdown(&self, force: bool) -> Result<(), ChannelError> {
        tracing::debug!(instance = self.index, force, "Signalling worker shutdown");
        self.outbox.send(ToWorker::Shutdown { force })
    }
}
