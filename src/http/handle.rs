//! The server interface shared by the listener primitive and its decorators.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::http::options::BoxError;
use crate::worker::channel::ChannelError;
use crate::worker::message::WorkerShutdownError;

/// Snapshot of a server's connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionsInfo {
    /// Open connections, busy or not.
    pub total: usize,
    /// Requests currently being handled.
    pub active: usize,
    /// Open connections with no request in flight.
    pub idle: usize,
}

/// Errors surfaced by [`ServerHandle::close`].
#[derive(Debug, thiserror::Error)]
pub enum CloseError {
    #[error("server task failed: {0}")]
    Server(#[from] std::io::Error),

    #[error("server task did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("close hook failed: {0}")]
    Hook(BoxError),

    #[error(transparent)]
    Worker(#[from] WorkerShutdownError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// A running HTTP server bound to one address/port.
pub trait ServerHandle: Send + Sync {
    /// Whether responses are gzip-compressed when the client accepts it.
    fn auto_compress(&self) -> bool;

    fn idle_timeout(&self) -> Option<Duration>;

    fn server_header(&self) -> Option<&str>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> SocketAddr;

    fn address(&self) -> IpAddr {
        self.local_addr().ip()
    }

    fn port(&self) -> u16 {
        self.local_addr().port()
    }

    fn default_response_headers(&self) -> &HeaderMap;

    fn session_timeout(&self) -> Duration;

    fn connections_info(&self) -> ConnectionsInfo;

    /// Stop serving. `force` drops open connections instead of draining them.
    fn close(&self, force: bool) -> BoxFuture<'_, Result<(), CloseError>>;
}
