//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{routing::get, Router};
use multiserve::{on_close, Instance, ServeOptions};

/// Router answering its instance index on `/` and sleeping on `/slow`.
pub fn instance_app() -> Router {
    Router::new()
        .route("/", get(|Instance(index): Instance| async move { index.to_string() }))
        .route(
            "/slow",
            get(|Instance(index): Instance| async move {
                tokio::time::sleep(Duration::from_millis(600)).await;
                index.to_string()
            }),
        )
}

/// Options for tests: no signal watcher, `isolates` listeners.
pub fn options(isolates: usize) -> ServeOptions {
    ServeOptions {
        number_of_isolates: isolates,
        install_signal_handler: false,
        ..ServeOptions::default()
    }
}

/// A client that opens a fresh connection for every request, so the kernel
/// gets to pick a listener each time.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Records every `on_close` invocation and fails for chosen instances.
#[derive(Clone, Default)]
pub struct CloseRecorder {
    calls: Arc<Mutex<Vec<usize>>>,
    failing: Arc<HashSet<usize>>,
    worker_delay: Duration,
}

impl CloseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(instances: &[usize]) -> Self {
        Self {
            calls: Arc::default(),
            failing: Arc::new(instances.iter().copied().collect()),
            worker_delay: Duration::ZERO,
        }
    }

    /// Make every worker (not the boss) take `delay` before recording.
    pub fn with_worker_delay(mut self, delay: Duration) -> Self {
        self.worker_delay = delay;
        self
    }

    /// Install this recorder as the `on_close` callback of `options`.
    pub fn install(&self, mut options: ServeOptions) -> ServeOptions {
        let recorder = self.clone();
        options.on_close = Some(on_close(move |instance| {
            let recorder = recorder.clone();
            async move {
                if instance != 0 {
                    tokio::time::sleep(recorder.worker_delay).await;
                }
                recorder.calls.lock().unwrap().push(instance);
                if recorder.failing.contains(&instance) {
                    Err(format!("instance {instance} refused to close").into())
                } else {
                    Ok(())
                }
            }
        }));
        options
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sorted_calls(&self) -> Vec<usize> {
        let mut calls = self.calls();
        calls.sort_unstable();
        calls
    }
}

/// Send `count` requests to `url` and collect the instance indices that answered.
pub async fn collect_instances(url: &str, count: usize) -> Vec<usize> {
    let client = client();
    let mut instances = Vec::with_capacity(count);
    for _ in 0..count {
        let body = client.get(url).send().await.unwrap().text().await.unwrap();
        instances.push(body.parse().unwrap());
    }
    instances
}
