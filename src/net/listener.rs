//! Shared TCP listener binding.
//!
//! # Responsibilities
//! - Bind a listening socket that other execution contexts may bind too
//! - Hand the bound socket to the HTTP layer in non-blocking mode
//!
//! # Design Decisions
//! - SO_REUSEPORT lets every worker own an independent listener on the same
//!   address/port; the kernel spreads incoming connections across them
//! - SO_REUSEADDR is always set so restarts do not trip over TIME_WAIT

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};

/// Listen backlog handed to the kernel for each shared socket.
const BACKLOG: i32 = 1024;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to create or bind the socket.
    Bind(std::io::Error),
    /// The configured address could not be parsed.
    InvalidAddress(String),
    /// A configured header name or value is not valid HTTP.
    InvalidHeader(String),
    /// Failed to load TLS material.
    Tls(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::InvalidAddress(a) => write!(f, "Invalid address: {}", a),
            ListenerError::InvalidHeader(h) => write!(f, "Invalid header: {}", h),
            ListenerError::Tls(e) => write!(f, "Failed to load TLS config: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Tls(e) => Some(e),
            _ => None,
        }
    }
}

/// Bind a listener at `addr` that tolerates other listeners on the same port.
///
/// The returned socket is already listening and set to non-blocking, ready to
/// be adopted by a Tokio runtime.
pub fn bind_shared(addr: SocketAddr) -> Result<std::net::TcpListener, ListenerError> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(ListenerError::Bind)?;
    socket.set_reuse_address(true).map_err(ListenerError::Bind)?;

    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuse_port(true).map_err(ListenerError::Bind)?;

    socket.set_nonblocking(true).map_err(ListenerError::Bind)?;
    socket.bind(&addr.into()).map_err(ListenerError::Bind)?;
    socket.listen(BACKLOG).map_err(ListenerError::Bind)?;

    let listener: std::net::TcpListener = socket.into();
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::debug!(address = %local_addr, "Shared listener bound");

    Ok(listener)
}
