//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! ServeConfig
//!     → proxy.rs (build router: handler + instance context + powered-by)
//!     → server.rs (shared listener, listener settings, axum-server)
//!     → requests reach the handler with InstanceInfo attached (context.rs)
//!
//! close(force)
//!     → proxy.rs (close hook, e.g. worker fan-out)
//!     → server.rs (graceful drain or forced drop)
//! ```

pub mod context;
pub mod handle;
pub mod options;
pub mod proxy;
pub mod server;

pub use context::{instance, Instance, InstanceInfo, MissingInstance};
pub use handle::{CloseError, ConnectionsInfo, ServerHandle};
pub use options::{on_close, BoxError, HandlerFactory, OnClose, ServeConfig, ServerSettings};
pub use proxy::{CloseHook, ProxyServer};
pub use server::SharedHttpServer;
