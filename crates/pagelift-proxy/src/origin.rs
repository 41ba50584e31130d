//! Origin pipeline re-entry.

use std::sync::{Arc, OnceLock};

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;
use tracing::warn;

use crate::error::ProxyError;

/// Cloneable handle through which the rendering core and the
/// authorization gate re-enter the server's own request pipeline.
///
/// The router it dispatches to is the *fully layered* one, so a
/// sub-request passes through the same middleware chain a real request
/// would. Because the layers themselves need the handle while the router
/// is still being built, installation happens after construction:
///
/// ```rust,ignore
/// let origin = Origin::new();
/// let app = build_routes().layer(render_layer(origin.clone()));
/// origin.install(app.clone());
/// ```
#[derive(Clone, Default)]
pub struct Origin {
    router: Arc<OnceLock<Router>>,
}

impl Origin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the finished router. Only the first call wins.
    pub fn install(&self, router: Router) {
        if self.router.set(router).is_err() {
            warn!("Origin router installed twice; keeping the first");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.router.get().is_some()
    }

    /// Dispatch a request through the whole pipeline.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let router = self
            .router
            .get()
            .ok_or(ProxyError::OriginUnavailable)?
            .clone();
        let response = router
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});
        Ok(response)
    }

    /// Dispatch a request and collect the response into memory.
    pub async fn dispatch_collect(
        &self,
        request: Request<Body>,
        max_bytes: usize,
    ) -> Result<SubResponse, ProxyError> {
        let response = self.dispatch(request).await?;
        let (parts, body) = response.into_parts();
        let body = to_bytes(body, max_bytes)
            .await
            .map_err(|e| ProxyError::BodyCollect(e.to_string()))?;
        Ok(SubResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// A response synthesized by re-entering the origin pipeline.
#[derive(Debug)]
pub struct SubResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SubResponse {
    /// Stand-in used when a sub-request cannot be resolved; the browser
    /// still gets an answer so the paused request is never left hanging.
    pub(crate) fn server_error() -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}
