//! Sub-request authorization gate.
//!
//! Before the real request runs, a GET is issued to a configured URI
//! through the origin pipeline. Its status decides: 401 and 403 are
//! mapped through as-is, any other non-2xx is a generic 502, and a 2xx
//! lets the real request continue to the next handler. The sub-response
//! body is always discarded.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::origin::Origin;

/// Shared state for the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub uri: String,
    pub origin: Origin,
}

impl GateState {
    pub fn new(uri: impl Into<String>, origin: Origin) -> Self {
        Self {
            uri: uri.into(),
            origin,
        }
    }
}

/// Authorization gate middleware.
pub async fn authorize(State(state): State<GateState>, request: Request, next: Next) -> Response {
    let sub_uri = resolve_sub_uri(&state.uri, request.uri());

    // The authorization endpoint itself must stay reachable, or the
    // sub-request would gate itself forever.
    if request.uri().path() == sub_uri {
        return next.run(request).await;
    }

    let mut headers = request.headers().clone();
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);

    let mut sub_request = match Request::builder()
        .method("GET")
        .uri(&sub_uri)
        .body(Body::empty())
    {
        Ok(sub_request) => sub_request,
        Err(e) => {
            warn!("Failed to build authorization sub-request: {}", e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };
    *sub_request.headers_mut() = headers;

    // Only the status matters; the body is dropped unread.
    let status = match state.origin.dispatch(sub_request).await {
        Ok(sub_response) => sub_response.status(),
        Err(e) => {
            warn!("Authorization sub-request failed: {}", e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    debug!(uri = %sub_uri, status = %status, "Authorization sub-request responded");

    if status == StatusCode::UNAUTHORIZED {
        (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
    } else if status == StatusCode::FORBIDDEN {
        (StatusCode::FORBIDDEN, "forbidden").into_response()
    } else if !status.is_success() {
        (
            StatusCode::BAD_GATEWAY,
            format!("authorization sub-request returned {}", status.as_u16()),
        )
            .into_response()
    } else {
        next.run(request).await
    }
}

/// Resolve the configured URI against the real request's URI. Absolute
/// paths stand alone; relative references resolve against the request's
/// directory.
fn resolve_sub_uri(gate_uri: &str, request_uri: &Uri) -> String {
    if gate_uri.starts_with('/') {
        return gate_uri.to_string();
    }
    let path = request_uri.path();
    let base = path.rfind('/').map(|i| &path[..=i]).unwrap_or("/");
    format!("{}{}", base, gate_uri)
}
