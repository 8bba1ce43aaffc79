//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (coordinator.rs):
//!     Validate isolate count → Spawn workers one by one → Bind boss
//!         → Install signal watcher
//!
//! Close (coordinator.rs):
//!     close(force) on boss → Signal every worker → Join on every outcome
//!         → on_close(0) → Boss listener closes → closed broadcast
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → close(force = true), unless a close completed → exit(0)
//! ```
//!
//! # Design Decisions
//! - Startup is sequential: a worker must report it is serving before the
//!   next one is spawned
//! - Close is a barrier: the boss waits for every worker
//! - The signal path never waits for a graceful drain: a forced close
//!   escalates one already in progress
//! - Signals stay handled for the life of the process

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{serve_multi_process, MultiProcessServer, ServeError, ServeOptions, WorkerGroup};
pub use shutdown::Shutdown;
