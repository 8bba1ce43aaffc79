//! Multi-worker serving coordinator.
//!
//! # Responsibilities
//! - Spawn `number_of_isolates - 1` workers, one at a time, each on the same
//!   address/port
//! - Run instance 0 (the boss) on the caller's runtime
//! - Fan a close out from the boss to every worker and join on the results
//! - Install the signal watcher for forced shutdown
//!
//! # Design Decisions
//! - Workers receive the caller's `on_close` as is; only the boss fans out
//! - A close waits for every worker before reporting; the first failure to
//!   arrive is the one returned, later ones are logged and dropped
//! - Overlapping closes share one collection of worker outcomes, so
//!   `on_close(0)` never runs before every worker has reported
//! - Port 0 is resolved by the first listener to bind; everyone else reuses it

use std::net::IpAddr;
use std::sync::Arc;

use axum::Router;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;

use crate::http::handle::{CloseError, ServerHandle};
use crate::http::options::{HandlerFactory, OnClose, ServeConfig, ServerSettings};
use crate::http::proxy::{CloseHook, ProxyServer};
use crate::http::server::SharedHttpServer;
use crate::lifecycle::signals::{exit_process, spawn_signal_watcher, termination_signal};
use crate::net::{ListenerError, SecurityContext};
use crate::observability::metrics;
use crate::worker::{WorkerError, WorkerHandle, WorkerSignal};

/// `x-powered-by` value used unless the caller picks another.
pub const DEFAULT_POWERED_BY: &str = "multiserve";

/// The handle returned to the caller: the boss's server.
pub type MultiProcessServer = Arc<ProxyServer<SharedHttpServer>>;

/// Options for [`serve_multi_process`].
#[derive(Clone)]
pub struct ServeOptions {
    /// Value of the `x-powered-by` header; `None` omits it.
    pub powered_by_header: Option<String>,

    /// Terminate TLS with this certificate and key.
    pub security_context: Option<SecurityContext>,

    /// Called by every instance before its listener closes.
    pub on_close: Option<OnClose>,

    /// Total listeners, boss included. Must be at least 1.
    pub number_of_isolates: usize,

    pub settings: ServerSettings,

    /// Force-close and exit the process on SIGINT/SIGTERM.
    pub install_signal_handler: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            powered_by_header: Some(DEFAULT_POWERED_BY.to_string()),
            security_context: None,
            on_close: None,
            number_of_isolates: 1,
            settings: ServerSettings::default(),
            install_signal_handler: true,
        }
    }
}

impl std::fmt::Debug for ServeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeOptions")
            .field("powered_by_header", &self.powered_by_header)
            .field("security_context", &self.security_context)
            .field("on_close", &self.on_close.is_some())
            .field("number_of_isolates", &self.number_of_isolates)
            .field("settings", &self.settings)
            .field("install_signal_handler", &self.install_signal_handler)
            .finish()
    }
}

/// Errors starting the server group.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("number_of_isolates must be at least 1, got {0}")]
    InvalidIsolateCount(usize),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// The workers a boss is responsible for.
#[derive(Debug)]
pub struct WorkerGroup {
    signals: Vec<WorkerSignal>,
    workers: Mutex<Vec<WorkerHandle>>,
}

impl WorkerGroup {
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self {
            signals: workers.iter().map(WorkerHandle::signal).collect(),
            workers: Mutex::new(workers),
        }
    }

    /// Signal every worker, then wait for all of them to report.
    ///
    /// Outcomes are collected once. A call that overlaps a collection in
    /// progress still delivers its command, so `force` escalates a graceful
    /// close, and returns only after that collection has finished.
    pub async fn shutdown(&self, force: bool) -> Result<(), CloseError> {
        for signal in &self.signals {
            if let Err(e) = signal.shutdown(force) {
                tracing::debug!(instance = signal.index(), error = %e, "Worker already terminated");
            }
        }

        let mut workers = self.workers.lock().await;
        if workers.is_empty() {
            return Ok(());
        }

        tracing::info!(workers = workers.len(), force, "Shutting down workers");

        let mut first_error: Option<CloseError> = None;
        let mut pending: FuturesUnordered<_> = std::mem::take(&mut *workers)
            .into_iter()
            .map(|worker| async move { (worker.index(), worker.outcome().await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            let failure = match result {
                Ok(outcome) => outcome.into_result(index).err().map(CloseError::from),
                Err(e) => Some(CloseError::from(e)),
            };

            match failure {
                Some(e) => {
                    tracing::warn!(instance = index, error = %e, "Worker shutdown failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => tracing::debug!(instance = index, "Worker shut down"),
            }
        }

        metrics::set_running_workers(0);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Close hook for the boss: fan out to the workers, then run `on_close(0)`.
fn boss_hook(group: Arc<WorkerGroup>, on_close: Option<OnClose>) -> CloseHook {
    Arc::new(move |force| {
        let group = group.clone();
        let on_close = on_close.clone();
        Box::pin(async move {
            group.shutdown(force).await?;
            if let Some(on_close) = on_close {
                on_close(0).await.map_err(CloseError::Hook)?;
            }
            Ok(())
        })
    })
}

/// Serve `handler` from `options.number_of_isolates` listeners sharing
/// `address:port`.
///
/// Instance 0 runs on the current runtime; the rest run on worker threads.
/// Closing the returned handle closes every worker first.
pub async fn serve_multi_process<F>(
    handler: F,
    address: IpAddr,
    port: u16,
    options: ServeOptions,
) -> Result<MultiProcessServer, ServeError>
where
    F: Fn() -> Router + Send + Sync + 'static,
{
    let isolates = options.number_of_isolates;
    if isolates == 0 {
        return Err(ServeError::InvalidIsolateCount(isolates));
    }

    let handler: HandlerFactory = Arc::new(handler);
    let base = ServeConfig {
        handler,
        address,
        port,
        powered_by_header: options.powered_by_header.clone(),
        security_context: options.security_context.clone(),
        settings: options.settings.clone(),
        instance_index: 0,
        on_close: options.on_close.clone(),
    };

    let mut port = port;
    let mut workers = Vec::with_capacity(isolates - 1);
    for index in 1..isolates {
        let config = ServeConfig {
            port,
            instance_index: index,
            ..base.clone()
        };

        match WorkerHandle::spawn(config).await {
            Ok(worker) => {
                port = worker.local_addr().port();
                workers.push(worker);
            }
            Err(e) => {
                tracing::error!(instance = index, error = %e, "Worker failed to start, stopping the others");
                let _ = WorkerGroup::new(workers).shutdown(true).await;
                return Err(e.into());
            }
        }
    }
    metrics::set_running_workers(workers.len());

    let group = Arc::new(WorkerGroup::new(workers));
    let hook = boss_hook(group.clone(), options.on_close.clone());
    let boss_config = ServeConfig {
        port,
        instance_index: 0,
        ..base
    };

    let server = match ProxyServer::create_with_hook(boss_config, hook).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            tracing::error!(error = %e, "Boss failed to start, stopping workers");
            let _ = group.shutdown(true).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        address = %server.local_addr(),
        isolates,
        "Serving on all isolates"
    );

    if options.install_signal_handler {
        spawn_signal_watcher(
            server.clone(),
            termination_signal(),
            server.subscribe_closed(),
            exit_process,
        );
    }

    Ok(server)
}
