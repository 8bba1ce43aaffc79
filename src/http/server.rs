//! HTTP server bound to a shared listener.
//!
//! # Responsibilities
//! - Bind a SO_REUSEPORT listener and serve an Axum router on it
//! - Apply listener settings (compression, server header, default headers,
//!   idle timeout)
//! - Serve plain HTTP or TLS through axum-server
//! - Report connection counts and close gracefully or forcibly
//!
//! # Design Decisions
//! - One instance per execution context; the serving task lives on the
//!   runtime that bound it
//! - `close` awaits the serving task so that the socket is released on return

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::{self, Next},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use futures_util::future::BoxFuture;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::{compression::CompressionLayer, set_header::SetResponseHeaderLayer};

use crate::http::handle::{CloseError, ConnectionsInfo, ServerHandle};
use crate::http::options::ServerSettings;
use crate::net::connection::RequestTracker;
use crate::net::{bind_shared, ListenerError};

/// The single-context listener primitive.
pub struct SharedHttpServer {
    local_addr: SocketAddr,
    settings: ServerSettings,
    handle: Handle,
    tracker: RequestTracker,
    task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl std::fmt::Debug for SharedHttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHttpServer")
            .field("local_addr", &self.local_addr)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SharedHttpServer {
    /// Bind `addr` and start serving `app` on the current runtime.
    pub async fn bind(
        addr: SocketAddr,
        app: Router,
        settings: ServerSettings,
        tls: Option<RustlsConfig>,
    ) -> Result<Self, ListenerError> {
        let listener = bind_shared(addr)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        let tracker = RequestTracker::new();
        let app = Self::build_router(app, &settings, tracker.clone())?;
        let service = app.into_make_service();
        let handle = Handle::new();

        let task = match tls {
            Some(tls) => {
                let mut server = axum_server::from_tcp_rustls(listener, tls).handle(handle.clone());
                configure_http(server.http_builder(), &settings);
                tokio::spawn(server.serve(service))
            }
            None => {
                let mut server = axum_server::from_tcp(listener).handle(handle.clone());
                configure_http(server.http_builder(), &settings);
                tokio::spawn(server.serve(service))
            }
        };

        tracing::info!(
            address = %local_addr,
            auto_compress = settings.auto_compress,
            "HTTP server listening"
        );

        Ok(Self {
            local_addr,
            settings,
            handle,
            tracker,
            task: Mutex::new(Some(task)),
        })
    }

    /// Wrap the router with the listener-level middleware.
    fn build_router(app: Router, settings: &ServerSettings, tracker: RequestTracker) -> Result<Router, ListenerError> {
        let mut app = app.layer(middleware::from_fn(move |request: Request, next: Next| {
            let guard = tracker.track();
            async move {
                let response = next.run(request).await;
                drop(guard);
                response
            }
        }));

        for (name, value) in settings.default_response_headers.iter() {
            app = app.layer(SetResponseHeaderLayer::if_not_present(name.clone(), value.clone()));
        }

        if let Some(server_header) = &settings.server_header {
            let value = HeaderValue::from_str(server_header)
                .map_err(|_| ListenerError::InvalidHeader(format!("server: {server_header}")))?;
            app = app.layer(SetResponseHeaderLayer::if_not_present(header::SERVER, value));
        }

        if settings.auto_compress {
            app = app.layer(CompressionLayer::new());
        }

        Ok(app)
    }
}

fn configure_http(builder: &mut Builder<TokioExecutor>, settings: &ServerSettings) {
    let mut http1 = builder.http1();
    http1.keep_alive(true).timer(TokioTimer::new());

    // A keep-alive connection waiting for its next request is waiting on headers.
    if let Some(idle) = settings.idle_timeout {
        http1.header_read_timeout(idle);
    }
}

impl ServerHandle for SharedHttpServer {
    fn auto_compress(&self) -> bool {
        self.settings.auto_compress
    }

    fn idle_timeout(&self) -> Option<Duration> {
        self.settings.idle_timeout
    }

    fn server_header(&self) -> Option<&str> {
        self.settings.server_header.as_deref()
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn default_response_headers(&self) -> &HeaderMap {
        &self.settings.default_response_headers
    }

    fn session_timeout(&self) -> Duration {
        self.settings.session_timeout
    }

    fn connections_info(&self) -> ConnectionsInfo {
        let total = self.handle.connection_count();
        let active = self.tracker.active_count() as usize;
        ConnectionsInfo {
            total,
            active,
            idle: total.saturating_sub(active),
        }
    }

    fn close(&self, force: bool) -> BoxFuture<'_, Result<(), CloseError>> {
        Box::pin(async move {
            tracing::debug!(address = %self.local_addr, force, "Closing HTTP server");

            if force {
                self.handle.shutdown();
            } else {
                self.handle.graceful_shutdown(None);
            }

            let task = self.task.lock().await.take();
            if let Some(task) = task {
                task.await??;
            }

            tracing::info!(address = %self.local_addr, "HTTP server stopped");
            Ok(())
        })
    }
}

impl Drop for SharedHttpServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn slow_app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "slow"
                }),
            )
    }

    async fn start(settings: ServerSettings) -> SharedHttpServer {
        SharedHttpServer::bind("127.0.0.1:0".parse().unwrap(), slow_app(), settings, None)
            .await
            .unwrap()
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn applies_default_and_server_headers() {
        let settings = ServerSettings {
            server_header: Some("multiserve-test".into()),
            ..ServerSettings::default()
        };
        let server = start(settings).await;

        let res = client()
            .get(format!("http://{}/", server.local_addr()))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["server"], "multiserve-test");
        assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
        assert_eq!(server.server_header(), Some("multiserve-test"));

        server.close(false).await.unwrap();
    }

    #[tokio::test]
    async fn graceful_close_lets_inflight_request_finish() {
        let server = start(ServerSettings::default()).await;
        let url = format!("http://{}/slow", server.local_addr());

        let inflight = tokio::spawn(async move { client().get(url).send().await });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(server.connections_info().active, 1);

        server.close(false).await.unwrap();

        let res = inflight.await.unwrap().unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "slow");
    }

    #[tokio::test]
    async fn forced_close_drops_inflight_request() {
        let server = start(ServerSettings::default()).await;
        let url = format!("http://{}/slow", server.local_addr());

        let inflight = tokio::spawn(async move { client().get(url).send().await });
        tokio::time::sleep(Duration::from_millis(150)).await;

        server.close(true).await.unwrap();

        assert!(inflight.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn second_close_is_a_no_op() {
        let server = start(ServerSettings::default()).await;
        server.close(false).await.unwrap();
        server.close(true).await.unwrap();
    }
}
