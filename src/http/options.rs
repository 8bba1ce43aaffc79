//! Serve configuration handed to every execution context.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::Router;
use futures_util::future::BoxFuture;

use crate::net::SecurityContext;

/// Boxed error type returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds the router for one execution context.
///
/// Called once per context so that no router state crosses a context boundary.
pub type HandlerFactory = Arc<dyn Fn() -> Router + Send + Sync>;

/// Callback run by a context before its listener closes, given its instance index.
pub type OnClose = Arc<dyn Fn(usize) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Wrap a closure returning a future into an [`OnClose`].
pub fn on_close<F, Fut>(f: F) -> OnClose
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |instance| Box::pin(f(instance)))
}

/// Listener-level settings, mirrored by every [`crate::http::ServerHandle`].
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Gzip responses when the client accepts it.
    pub auto_compress: bool,

    /// How long a keep-alive connection may sit without a new request.
    pub idle_timeout: Option<Duration>,

    /// Value of the `server` response header, if any.
    pub server_header: Option<String>,

    /// Headers added to every response that does not already carry them.
    pub default_response_headers: HeaderMap,

    /// Session lifetime advertised to handlers.
    pub session_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

        Self {
            auto_compress: false,
            idle_timeout: Some(Duration::from_secs(120)),
            server_header: None,
            default_response_headers: headers,
            session_timeout: Duration::from_secs(20 * 60),
        }
    }
}

/// Everything one execution context needs to start serving.
///
/// Cloned into each worker; the handler is rebuilt and TLS material reloaded
/// on the receiving side.
#[derive(Clone)]
pub struct ServeConfig {
    pub handler: HandlerFactory,
    pub address: IpAddr,
    pub port: u16,
    pub powered_by_header: Option<String>,
    pub security_context: Option<SecurityContext>,
    pub settings: ServerSettings,
    pub instance_index: usize,
    pub on_close: Option<OnClose>,
}

impl ServeConfig {
    /// Socket address this context binds.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl std::fmt::Debug for ServeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("powered_by_header", &self.powered_by_header)
            .field("security_context", &self.security_context)
            .field("settings", &self.settings)
            .field("instance_index", &self.instance_index)
            .field("on_close", &self.on_close.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_carry_security_headers() {
        let settings = ServerSettings::default();
        assert_eq!(settings.default_response_headers.len(), 3);
        assert_eq!(
            settings.default_response_headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(120)));
        assert!(!settings.auto_compress);
    }

    #[tokio::test]
    async fn on_close_wraps_async_closure() {
        let hook = on_close(|instance| async move {
            if instance == 3 {
                Err("boom".into())
            } else {
                Ok(())
            }
        });
        assert!(hook(1).await.is_ok());
        assert_eq!(hook(3).await.unwrap_err().to_string(), "boom");
    }
}
