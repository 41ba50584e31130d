//! Upstream forwarder: the innermost handler of the standalone proxy.
//!
//! Everything the gate admits and the renderer does not intercept ends
//! up here and is forwarded to the configured origin server.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use url::Url;

/// Headers meaningful for a single hop only, stripped in both directions.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared state of the forwarder.
#[derive(Clone)]
pub struct UpstreamContext {
    base: Url,
    client: reqwest::Client,
}

impl UpstreamContext {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base)?,
            client: reqwest::Client::new(),
        })
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Forward the request to the upstream origin, streaming both bodies.
pub async fn forward(State(upstream): State<UpstreamContext>, request: Request) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = match upstream.base.join(path) {
        Ok(target) => target,
        Err(e) => {
            warn!("Cannot resolve {} against upstream base: {}", path, e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    // The upstream sees its own host; the original one travels in the
    // forwarding headers.
    if let Some(host) = headers.remove(header::HOST) {
        headers.insert("x-forwarded-host", host);
    }
    if !headers.contains_key("x-forwarded-proto") {
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    }

    let outbound = upstream
        .client
        .request(parts.method, target.clone())
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    let inbound = match outbound {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!("Upstream request to {} failed: {}", target, e);
            return (StatusCode::BAD_GATEWAY, "upstream unreachable").into_response();
        }
    };

    let status = inbound.status();
    let mut headers = inbound.headers().clone();
    strip_hop_by_hop(&mut headers);

    debug!(url = %target, status = %status, "Forwarded upstream response");

    let mut response = Response::new(Body::from_stream(inbound.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
