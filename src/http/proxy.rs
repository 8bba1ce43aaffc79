//! Server decorator that runs a hook before closing.
//!
//! # Responsibilities
//! - Forward every accessor of the wrapped server unchanged
//! - Run the close hook exactly once per `close`, before the wrapped close
//! - Announce every completed close to subscribers
//! - Build the per-context router (instance context, powered-by header)
//!
//! # Design Decisions
//! - Composition over the [`ServerHandle`] trait, every method delegated
//!   explicitly
//! - A failing hook aborts the close; the wrapped server stays up

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::{self, Next},
};
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::http::context::{self, InstanceInfo};
use crate::http::handle::{CloseError, ConnectionsInfo, ServerHandle};
use crate::http::options::{OnClose, ServeConfig};
use crate::http::server::SharedHttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::ListenerError;
use crate::observability::metrics;

/// Header announcing the serving stack.
pub const X_POWERED_BY: &str = "x-powered-by";

/// Hook awaited before the wrapped server closes, given the close's force flag.
pub type CloseHook = Arc<dyn Fn(bool) -> BoxFuture<'static, Result<(), CloseError>> + Send + Sync>;

/// Hook that invokes `on_close(index)` if a callback is configured.
pub fn instance_hook(index: usize, on_close: Option<OnClose>) -> CloseHook {
    Arc::new(move |_force| {
        let on_close = on_close.clone();
        Box::pin(async move {
            if let Some(on_close) = on_close {
                on_close(index).await.map_err(CloseError::Hook)?;
            }
            Ok(())
        })
    })
}

/// A [`ServerHandle`] whose `close` runs a hook first.
pub struct ProxyServer<S> {
    inner: S,
    on_close: CloseHook,
    closed: Shutdown,
}

impl<S: std::fmt::Debug> std::fmt::Debug for ProxyServer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S: ServerHandle> ProxyServer<S> {
    pub fn new(inner: S, on_close: CloseHook) -> Self {
        Self {
            inner,
            on_close,
            closed: Shutdown::new(),
        }
    }

    /// Fires once per `close` that ran both the hook and the wrapped close
    /// successfully.
    pub fn subscribe_closed(&self) -> broadcast::Receiver<()> {
        self.closed.subscribe()
    }

    /// The wrapped server.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl ProxyServer<SharedHttpServer> {
    /// Bind a shared listener for `config`, closing through `config.on_close`.
    pub async fn create(config: ServeConfig) -> Result<Self, ListenerError> {
        let hook = instance_hook(config.instance_index, config.on_close.clone());
        Self::create_with_hook(config, hook).await
    }

    /// Bind a shared listener for `config` with a custom close hook.
    pub async fn create_with_hook(config: ServeConfig, on_close: CloseHook) -> Result<Self, ListenerError> {
        let index = config.instance_index;

        let mut app = context::attach((config.handler)(), InstanceInfo::new(index));
        app = app.layer(middleware::from_fn(move |request: Request, next: Next| {
            metrics::record_request(index);
            next.run(request)
        }));

        if let Some(powered_by) = &config.powered_by_header {
            let value = HeaderValue::from_str(powered_by)
                .map_err(|_| ListenerError::InvalidHeader(format!("{X_POWERED_BY}: {powered_by}")))?;
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(X_POWERED_BY),
                value,
            ));
        }

        let tls = match &config.security_context {
            Some(ctx) => Some(ctx.load().await.map_err(ListenerError::Tls)?),
            None => None,
        };

        let inner = SharedHttpServer::bind(config.socket_addr(), app, config.settings.clone(), tls).await?;
        tracing::debug!(instance = index, address = %inner.local_addr(), "Instance server created");

        Ok(Self::new(inner, on_close))
    }
}

impl<S: ServerHandle> ServerHandle for ProxyServer<S> {
    fn auto_compress(&self) -> bool {
        self.inner.auto_compress()
    }

    fn idle_timeout(&self) -> Option<Duration> {
        self.inner.idle_timeout()
    }

    fn server_header(&self) -> Option<&str> {
        self.inner.server_header()
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    fn default_response_headers(&self) -> &HeaderMap {
        self.inner.default_response_headers()
    }

    fn session_timeout(&self) -> Duration {
        self.inner.session_timeout()
    }

    fn connections_info(&self) -> ConnectionsInfo {
        self.inner.connections_info()
    }

    fn close(&self, force: bool) -> BoxFuture<'_, Result<(), CloseError>> {
        Box::pin(async move {
            (self.on_close)(force).await?;
            self.inner.close(force).await?;
            self.closed.trigger();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::Instance;
    use crate::http::options::{on_close, ServerSettings};
    use axum::{routing::get, Router};
    use std::sync::Mutex;

    /// Records the order of hook and close calls.
    struct FakeServer {
        log: Arc<Mutex<Vec<String>>>,
        headers: HeaderMap,
    }

    impl ServerHandle for FakeServer {
        fn auto_compress(&self) -> bool {
            true
        }
        fn idle_timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(7))
        }
        fn server_header(&self) -> Option<&str> {
            Some("fake")
        }
        fn local_addr(&self) -> SocketAddr {
            "127.0.0.1:4242".parse().unwrap()
        }
        fn default_response_headers(&self) -> &HeaderMap {
            &self.headers
        }
        fn session_timeout(&self) -> Duration {
            Duration::from_secs(9)
        }
        fn connections_info(&self) -> ConnectionsInfo {
            ConnectionsInfo { total: 3, active: 1, idle: 2 }
        }
        fn close(&self, force: bool) -> BoxFuture<'_, Result<(), CloseError>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("close:{force}"));
                Ok(())
            })
        }
    }

    fn fake(log: &Arc<Mutex<Vec<String>>>) -> FakeServer {
        FakeServer {
            log: log.clone(),
            headers: HeaderMap::new(),
        }
    }

    fn recording_hook(log: &Arc<Mutex<Vec<String>>>, fail: bool) -> CloseHook {
        let log = log.clone();
        Arc::new(move |force| {
            let log = log.clone();
            Box::pin(async move {
                tokio::task::yield_now().await;
                log.lock().unwrap().push(format!("hook:{force}"));
                if fail {
                    Err(CloseError::Hook("hook failed".into()))
                } else {
                    Ok(())
                }
            })
        })
    }

    #[tokio::test]
    async fn hook_runs_before_inner_close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = ProxyServer::new(fake(&log), recording_hook(&log, false));

        proxy.close(true).await.unwrap();
        proxy.close(false).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["hook:true", "close:true", "hook:false", "close:false"]
        );
    }

    #[tokio::test]
    async fn failing_hook_skips_inner_close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = ProxyServer::new(fake(&log), recording_hook(&log, true));

        let mut closed = proxy.subscribe_closed();
        let err = proxy.close(false).await.unwrap_err();

        assert!(matches!(err, CloseError::Hook(_)));
        assert_eq!(*log.lock().unwrap(), vec!["hook:false"]);
        assert!(closed.try_recv().is_err());
    }

    #[tokio::test]
    async fn completed_close_is_announced() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = ProxyServer::new(fake(&log), recording_hook(&log, false));
        let mut closed = proxy.subscribe_closed();

        assert!(closed.try_recv().is_err());
        proxy.close(true).await.unwrap();

        assert!(closed.try_recv().is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["hook:true", "close:true"]);
    }

    #[test]
    fn accessors_are_forwarded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = ProxyServer::new(fake(&log), recording_hook(&log, false));

        assert!(proxy.auto_compress());
        assert_eq!(proxy.idle_timeout(), Some(Duration::from_secs(7)));
        assert_eq!(proxy.server_header(), Some("fake"));
        assert_eq!(proxy.port(), 4242);
        assert_eq!(proxy.session_timeout(), Duration::from_secs(9));
        assert_eq!(proxy.connections_info().idle, 2);
    }

    #[tokio::test]
    async fn instance_hook_passes_index() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let callback = on_close(move |index| {
            recorder.lock().unwrap().push(index);
            async { Ok(()) }
        });

        instance_hook(5, Some(callback))(false).await.unwrap();
        instance_hook(6, None)(true).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn created_server_tags_requests() {
        let config = ServeConfig {
            handler: Arc::new(|| {
                Router::new().route("/", get(|Instance(index): Instance| async move { index.to_string() }))
            }),
            address: "127.0.0.1".parse().unwrap(),
            port: 0,
            powered_by_header: Some("multiserve".into()),
            security_context: None,
            settings: ServerSettings::default(),
            instance_index: 2,
            on_close: None,
        };
        let server = ProxyServer::create(config).await.unwrap();

        let res = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://{}/", server.local_addr()))
            .send()
            .await
            .unwrap();

        assert_eq!(res.headers()[X_POWERED_BY], "multiserve");
        assert_eq!(res.text().await.unwrap(), "2");

        server.close(false).await.unwrap();
    }
}
