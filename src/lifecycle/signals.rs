//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM, whichever comes first
//! - Force-close the server group and exit the process
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The watcher races the signal against the server's own close. Once a
//!   close has completed, a signal only exits; it never stops listening,
//!   since Tokio keeps the default handlers replaced for the process lifetime
//! - Errors from the forced close are logged and otherwise ignored

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::http::handle::ServerHandle;

/// Resolve on the first interrupt or termination signal.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Exit the whole process successfully.
pub fn exit_process() {
    tracing::info!("Exiting");
    std::process::exit(0);
}

/// Call `exit` when `signal` resolves, force-closing `server` first unless
/// `closed` reports that a close already completed.
pub fn spawn_signal_watcher<S, F, X>(
    server: Arc<S>,
    signal: F,
    mut closed: broadcast::Receiver<()>,
    exit: X,
) -> JoinHandle<()>
where
    S: ServerHandle + 'static,
    F: Future<Output = ()> + Send + 'static,
    X: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        tokio::pin!(signal);

        tokio::select! {
            _ = &mut signal => {
                tracing::warn!("Termination signal received, forcing shutdown");
                if let Err(e) = server.close(true).await {
                    tracing::warn!(error = %e, "Forced shutdown reported an error");
                }
            }
            _ = closed.recv() => {
                tracing::debug!("Server group closed, signals now only exit");
                drop(server);
                signal.await;
                tracing::info!("Termination signal received after close");
            }
        }

        exit();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handle::{CloseError, ConnectionsInfo};
    use crate::lifecycle::Shutdown;
    use axum::http::HeaderMap;
    use futures_util::future::BoxFuture;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct FakeServer {
        fail: bool,
        closes: Mutex<Vec<bool>>,
        headers: HeaderMap,
    }

    impl ServerHandle for FakeServer {
        fn auto_compress(&self) -> bool {
            false
        }
        fn idle_timeout(&self) -> Option<Duration> {
            None
        }
        fn server_header(&self) -> Option<&str> {
            None
        }
        fn local_addr(&self) -> SocketAddr {
            "127.0.0.1:1".parse().unwrap()
        }
        fn default_response_headers(&self) -> &HeaderMap {
            &self.headers
        }
        fn session_timeout(&self) -> Duration {
            Duration::ZERO
        }
        fn connections_info(&self) -> ConnectionsInfo {
            ConnectionsInfo::default()
        }
        fn close(&self, force: bool) -> BoxFuture<'_, Result<(), CloseError>> {
            Box::pin(async move {
                self.closes.lock().unwrap().push(force);
                if self.fail {
                    Err(CloseError::Hook("worker refused".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn signal_forces_close_and_exits_even_on_error() {
        let server = Arc::new(FakeServer {
            fail: true,
            ..FakeServer::default()
        });
        let shutdown = Shutdown::new();
        let exited = Arc::new(AtomicBool::new(false));
        let (fire, signal) = oneshot::channel::<()>();

        let flag = exited.clone();
        let watcher = spawn_signal_watcher(
            server.clone(),
            async move {
                let _ = signal.await;
            },
            shutdown.subscribe(),
            move || flag.store(true, Ordering::SeqCst),
        );

        fire.send(()).unwrap();
        watcher.await.unwrap();

        assert_eq!(*server.closes.lock().unwrap(), vec![true]);
        assert!(exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn signal_after_completed_close_still_exits() {
        let server = Arc::new(FakeServer::default());
        let shutdown = Shutdown::new();
        let exited = Arc::new(AtomicBool::new(false));
        let (fire, signal) = oneshot::channel::<()>();

        let flag = exited.clone();
        let watcher = spawn_signal_watcher(
            server.clone(),
            async move {
                let _ = signal.await;
            },
            shutdown.subscribe(),
            move || flag.store(true, Ordering::SeqCst),
        );

        // 1. The close completes first; the watcher stays armed
        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!watcher.is_finished());
        assert!(!exited.load(Ordering::SeqCst));

        // 2. A later signal exits without closing again
        fire.send(()).unwrap();
        watcher.await.unwrap();

        assert!(server.closes.lock().unwrap().is_empty());
        assert!(exited.load(Ordering::SeqCst));
    }
}
