//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → ServeOptions handed to the coordinator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; workers get copies, never references
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{HttpConfig, ObservabilityConfig, ServerConfig, ServiceConfig};
pub use validation::ValidationError;
