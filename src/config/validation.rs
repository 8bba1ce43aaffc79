//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (isolates >= 1, timeouts > 0)
//! - Check addresses and header values parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.isolates must be at least 1")]
    NoIsolates,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("http.idle_timeout_secs must be greater than 0")]
    ZeroIdleTimeout,

    #[error("tls.{0} must not be empty")]
    EmptyTlsPath(&'static str),
}

/// Check `config` for every semantic error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.isolates == 0 {
        errors.push(ValidationError::NoIsolates);
    }

    if let Err(e) = config.address() {
        errors.push(e);
    }

    if let Some(powered_by) = &config.server.powered_by {
        if HeaderValue::from_str(powered_by).is_err() {
            errors.push(ValidationError::InvalidHeader(format!("x-powered-by: {powered_by}")));
        }
    }

    if let Some(server_header) = &config.http.server_header {
        if HeaderValue::from_str(server_header).is_err() {
            errors.push(ValidationError::InvalidHeader(format!("server: {server_header}")));
        }
    }

    if let Err(e) = config.server_settings() {
        errors.push(e);
    }

    if config.http.idle_timeout_secs == Some(0) {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    if let Some(tls) = &config.tls {
        if tls.cert_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("cert_path"));
        }
        if tls.key_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key_path"));
        }
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServiceConfig::default();
        config.server.isolates = 0;
        config.server.address = "localhost:80".into();
        config.http.idle_timeout_secs = Some(0);
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoIsolates,
                ValidationError::InvalidAddress("localhost:80".into()),
                ValidationError::ZeroIdleTimeout,
                ValidationError::InvalidAddress("nope".into()),
            ]
        );
    }
}
