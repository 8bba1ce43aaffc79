//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Boss and every worker thread produce:
//!     → logging.rs (structured log events, tagged with `instance`)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
