//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServeConfig (address, port, security context)
//!     → listener.rs (SO_REUSEPORT socket, one per execution context)
//!     → tls.rs (optional rustls config, loaded per context)
//!     → Hand off to HTTP layer
//!     → connection.rs (in-flight request accounting)
//! ```
//!
//! # Design Decisions
//! - Every execution context binds its own socket; nothing is inherited
//! - Connection distribution across contexts is left to the kernel
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use listener::{bind_shared, ListenerError};
pub use tls::SecurityContext;
