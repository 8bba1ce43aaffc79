//! Multi-worker HTTP serving library.
//!
//! Runs one Axum application on several independent listeners bound to the
//! same address/port, one per worker thread, and hands back a single server
//! handle whose `close` tears every worker down before returning.

pub mod computation;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod worker;

pub use config::schema::ServiceConfig;
pub use http::{instance, on_close, Instance, InstanceInfo, ServerHandle, ServerSettings};
pub use lifecycle::{serve_multi_process, MultiProcessServer, ServeError, ServeOptions};
pub use net::SecurityContext;
