//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! every section has defaults, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;
use crate::http::options::ServerSettings;
use crate::lifecycle::coordinator::{ServeOptions, DEFAULT_POWERED_BY};
use crate::net::SecurityContext;
use crate::observability::logging::DEFAULT_FILTER;

/// Root configuration for a multiserve deployment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address, port and worker count.
    pub server: ServerConfig,

    /// Listener-level HTTP settings.
    pub http: HttpConfig,

    /// Optional TLS termination.
    pub tls: Option<SecurityContext>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Where to listen and how many listeners to run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind (e.g., "0.0.0.0").
    pub address: String,

    pub port: u16,

    /// Number of listeners, boss included.
    pub isolates: usize,

    /// `x-powered-by` header value; omit the key to disable the header.
    pub powered_by: Option<String>,

    /// Exit on SIGINT/SIGTERM after a forced close.
    pub install_signal_handler: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 3000,
            isolates: 1,
            powered_by: Some(DEFAULT_POWERED_BY.to_string()),
            install_signal_handler: true,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub auto_compress: bool,

    /// Keep-alive idle timeout in seconds; omit to disable.
    pub idle_timeout_secs: Option<u64>,

    pub server_header: Option<String>,

    pub session_timeout_secs: u64,

    /// Headers added to every response unless the handler set them.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let settings = ServerSettings::default();
        let default_headers = settings
            .default_response_headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();

        Self {
            auto_compress: settings.auto_compress,
            idle_timeout_secs: settings.idle_timeout.map(|d| d.as_secs()),
            server_header: settings.server_header,
            session_timeout_secs: settings.session_timeout.as_secs(),
            default_headers,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_FILTER.to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parsed bind address.
    pub fn address(&self) -> Result<IpAddr, ValidationError> {
        self.server
            .address
            .parse()
            .map_err(|_| ValidationError::InvalidAddress(self.server.address.clone()))
    }

    /// Listener settings described by the `[http]` section.
    pub fn server_settings(&self) -> Result<ServerSettings, ValidationError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.http.default_headers {
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|_| ValidationError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        Ok(ServerSettings {
            auto_compress: self.http.auto_compress,
            idle_timeout: self.http.idle_timeout_secs.map(Duration::from_secs),
            server_header: self.http.server_header.clone(),
            default_response_headers: headers,
            session_timeout: Duration::from_secs(self.http.session_timeout_secs),
        })
    }

    /// Options for [`crate::serve_multi_process`]. Callbacks are left unset.
    pub fn serve_options(&self) -> Result<ServeOptions, ValidationError> {
        Ok(ServeOptions {
            powered_by_header: self.server.powered_by.clone(),
            security_context: self.tls.clone(),
            on_close: None,
            number_of_isolates: self.server.isolates,
            settings: self.server_settings()?,
            install_signal_handler: self.server.install_signal_handler,
        })
    }
}
