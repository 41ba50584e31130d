//! Rendering middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::capture::{capture_if_eligible, CaptureOutcome};
use crate::origin::Origin;
use crate::render::{render_page, RenderSettings};
use crate::rewrite::rewrite_document;

/// Shared state for the rendering middleware.
#[derive(Clone)]
pub struct RenderState {
    pub settings: Arc<RenderSettings>,
    pub origin: Origin,
}

impl RenderState {
    pub fn new(settings: RenderSettings, origin: Origin) -> Self {
        Self {
            settings: Arc::new(settings),
            origin,
        }
    }
}

/// Rendering middleware.
///
/// Runs the inner pipeline; a response whose Content-Type matches the
/// allow-list is buffered, loaded in headless Chrome (with every browser
/// sub-request relayed back through the origin), and rewritten with the
/// rendered markup. Everything else passes through untouched. A render
/// failure yields a plain 502 — no partial markup is ever emitted.
pub async fn render_response(
    State(state): State<RenderState>,
    request: Request,
    next: Next,
) -> Response {
    // Snapshot what the navigation URL needs before the pipeline
    // consumes the request.
    let scheme = navigation_scheme(&state.settings, &request);
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let captured = match capture_if_eligible(
        response,
        &state.settings.content_types,
        state.settings.max_body_bytes,
    )
    .await
    {
        Ok(CaptureOutcome::PassThrough(response)) => return response,
        Ok(CaptureOutcome::Captured(captured)) => Arc::new(captured),
        Err(e) => {
            error!("Failed to buffer response for rendering: {}", e);
            return server_error();
        }
    };

    let operation = Uuid::new_v4();
    let navigation_url = navigation_url(&scheme, &host, &uri);
    info!(%operation, url = %navigation_url, "Rendering captured response");

    // Tie the operation to the request lifetime: if the client goes away
    // and this future is dropped, the guard cancels the spawned
    // operation, which unwinds through its own teardown.
    let cancel = CancellationToken::new();
    let abort_guard = cancel.clone().drop_guard();

    let task = tokio::spawn(render_page(
        state.settings.clone(),
        state.origin.clone(),
        captured.clone(),
        navigation_url.clone(),
        cancel,
    ));

    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(%operation, "Render task died: {}", e);
            return server_error();
        }
    };
    drop(abort_guard);

    match result {
        Ok(markup) => {
            debug!(%operation, bytes = markup.len(), "Render complete");
            rewrite_document(&captured, &markup)
        }
        Err(e) => {
            error!(%operation, url = %navigation_url, "Rendering failed: {}", e);
            server_error()
        }
    }
}

/// Scheme for the navigation URL: explicit override first, then the
/// forwarding header, then plain http.
fn navigation_scheme(settings: &RenderSettings, request: &Request) -> String {
    if let Some(scheme) = &settings.forced_scheme {
        return scheme.clone();
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "http".to_string())
}

/// The URL the browser navigates to: the real request's host and URI.
/// Sub-requests for it are answered from the captured response, so it
/// must match what the browser will ask for, byte for byte.
fn navigation_url(scheme: &str, host: &str, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, host, path)
}

fn server_error() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("http://ignored/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[test]
    fn test_navigation_url_includes_query() {
        let uri: Uri = "/search?q=rust&page=2".parse().unwrap();
        assert_eq!(
            navigation_url("http", "localhost:8080", &uri),
            "http://localhost:8080/search?q=rust&page=2"
        );
    }

    #[test]
    fn test_navigation_url_bare_path() {
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(
            navigation_url("https", "example.com", &uri),
            "https://example.com/"
        );
    }

    #[test]
    fn test_scheme_default_is_http() {
        let settings = RenderSettings::default();
        let request = request_with(&[]);
        assert_eq!(navigation_scheme(&settings, &request), "http");
    }

    #[test]
    fn test_scheme_from_forwarding_header() {
        let settings = RenderSettings::default();
        let request = request_with(&[("x-forwarded-proto", "https")]);
        assert_eq!(navigation_scheme(&settings, &request), "https");
    }

    #[test]
    fn test_scheme_override_wins() {
        let settings = RenderSettings {
            forced_scheme: Some("https".to_string()),
            ..RenderSettings::default()
        };
        let request = request_with(&[("x-forwarded-proto", "http")]);
        assert_eq!(navigation_scheme(&settings, &request), "https");
    }
}
