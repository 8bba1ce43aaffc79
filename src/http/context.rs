//! Per-request instance context.
//!
//! Every router built for an execution context is layered with that
//! context's [`InstanceInfo`], so handlers can ask which worker served them:
//!
//! ```rust,ignore
//! async fn handler(Instance(index): Instance) -> String {
//!     format!("served by worker {index}")
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions, StatusCode},
    response::{IntoResponse, Response},
    Extension, Router,
};

/// Identity of the execution context serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceInfo {
    index: usize,
}

impl InstanceInfo {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Worker index; `0` is the boss.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The request was not produced by a multiserve listener.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no instance context attached to this request")]
pub struct MissingInstance;

impl IntoResponse for MissingInstance {
    fn into_response(self) -> Response {
        tracing::error!("Instance context requested outside a multiserve listener");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Read the serving worker's index from a request's extensions.
pub fn instance(extensions: &Extensions) -> Result<usize, MissingInstance> {
    extensions
        .get::<InstanceInfo>()
        .map(InstanceInfo::index)
        .ok_or(MissingInstance)
}

/// Attach `info` to every request routed through `router`.
pub fn attach(router: Router, info: InstanceInfo) -> Router {
    router.layer(Extension(info))
}

/// Extractor yielding the serving worker's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance(pub usize);

impl<S> FromRequestParts<S> for Instance
where
    S: Send + Sync,
{
    type Rejection = MissingInstance;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        instance(&parts.extensions).map(Instance)
    }
}
