
use super::*;
use axum::http::header;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use serde_json::json;

const NAV_URL: &str = "http://localhost:8080/page";

fn paused_event(resource_type: &str, url: &str, headers: Value) -> RequestPausedEvent {
    serde_json::from_value(json!({
        "requestId": "job-1",
        "resourceType": resource_type,
        "request": {"url": url, "method": "GET", "headers": headers}
    }))
    .unwrap()
}

fn captured_document() -> CapturedResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
    CapturedResponse::new(
        StatusCode::OK,
        headers,
        Bytes::from_static(b"<html><body>hi</body></html>"),
    )
}

fn test_origin() -> Origin {
    let origin = Origin::new();
    let app = Router::new()
        .route(
            "/app.js",
            get(|| async {
                Response::builder()
                    .header(header::CONTENT_TYPE, "application/javascript")
                    .header(header::SET_COOKIE, "a=1")
                    .header(header::SET_COOKIE, "b=2")
                    .body(axum::body::Body::from("console.log(1)"))
                    .unwrap()
            }),
        )
        .route(
            "/echo-probe",
            get(|request: axum::extract::Request| async move {
                request
                    .headers()
                    .get("x-probe")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("missing")
                    .to_string()
            }),
        );
    origin.install(app);
    origin
}

#[test]
fn test_primary_navigation_requires_document_and_exact_url() {
    let event = paused_event("Document", NAV_URL, json!({}));
    assert!(is_primary_navigation(&event, NAV_URL));

    let other_url = paused_event("Document", "http://localhost:8080/other", json!({}));
    assert!(!is_primary_navigation(&other_url, NAV_URL));

    let sub_resource = paused_event("Script", NAV_URL, json!({}));
    assert!(!is_primary_navigation(&sub_resource, NAV_URL));
}

#[test]
fn test_decode_header_map() {
    let raw = json!({"Accept": "text/html", "User-Agent": "HeadlessChrome"});
    let headers = decode_header_map(&raw).unwrap();
    assert_eq!(headers.get(header::ACCEPT).unwrap(), "text/html");
    assert_eq!(headers.get(header::USER_AGENT).unwrap(), "HeadlessChrome");
}

#[test]
fn test_decode_header_map_null_is_empty() {
    let headers = decode_header_map(&Value::Null).unwrap();
    assert!(headers.is_empty());
}

#[test]
fn test_decode_header_map_rejects_non_map() {
    let result = decode_header_map(&json!(["not", "a", "map"]));
    assert!(matches!(result, Err(ProxyError::HeaderDecode(_))));
}

#[test]
fn test_decode_header_map_rejects_non_string_value() {
    let result = decode_header_map(&json!({"Accept": 42}));
    assert!(matches!(result, Err(ProxyError::HeaderDecode(_))));
}

#[test]
fn test_flatten_preserves_multiplicity() {
    let mut headers = HeaderMap::new();
    headers.append(header::SET_COOKIE, "a=1".parse().unwrap());
    headers.append(header::SET_COOKIE, "b=2".parse().unwrap());
    headers.insert(header::CONTENT_TYPE, "text/css".parse().unwrap());

    let entries = flatten_headers(&headers);
    assert_eq!(entries.len(), 3);
    let cookies: Vec<_> = entries
        .iter()
        .filter(|e| e.name == "set-cookie")
        .map(|e| e.value.as_str())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn test_resolve_primary_navigation_uses_captured_verbatim() {
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event("Document", NAV_URL, json!({"Accept": "text/html"}));

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;

    assert!(matches!(source, RelaySource::Document(_)));
    assert_eq!(source.status(), StatusCode::OK);
    assert_eq!(source.body(), captured.body());
    assert_eq!(
        source.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html"
    );
}

#[tokio::test]
async fn test_resolve_sub_resource_reenters_origin() {
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event("Script", "http://localhost:8080/app.js", json!({}));

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;

    assert!(matches!(source, RelaySource::Synthesized(_)));
    assert_eq!(source.status(), StatusCode::OK);
    assert_eq!(source.body(), b"console.log(1)");
}

#[tokio::test]
async fn test_resolve_passes_pause_headers_to_origin() {
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event(
        "Fetch",
        "http://localhost:8080/echo-probe",
        json!({"X-Probe": "abc123"}),
    );

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;
    assert_eq!(source.body(), b"abc123");
}

#[tokio::test]
async fn test_resolve_sub_resource_multiplicity_survives() {
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event("Script", "http://localhost:8080/app.js", json!({}));

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;
    let entries = flatten_headers(source.headers());
    let cookies: Vec<_> = entries.iter().filter(|e| e.name == "set-cookie").collect();
    assert_eq!(cookies.len(), 2);
}

#[tokio::test]
async fn test_resolve_bad_headers_degrades_to_server_error() {
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event(
        "Script",
        "http://localhost:8080/app.js",
        json!({"Accept": 42}),
    );

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;
    assert_eq!(source.status(), StatusCode::BAD_GATEWAY);
    assert!(source.body().is_empty());
}

#[tokio::test]
async fn test_resolve_uninstalled_origin_degrades_to_server_error() {
    let captured = captured_document();
    let origin = Origin::new();
    let event = paused_event("Script", "http://localhost:8080/app.js", json!({}));

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;
    assert_eq!(source.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_resolve_document_with_other_url_reenters_origin() {
    // A document-type pause for a *different* URL is a sub-resource
    // (e.g. an iframe), never the captured response.
    let captured = captured_document();
    let origin = test_origin();
    let event = paused_event("Document", "http://localhost:8080/app.js", json!({}));

    let source = resolve(&event, &captured, &origin, NAV_URL, usize::MAX).await;
    assert!(matches!(source, RelaySource::Synthesized(_)));
    assert_eq!(source.body(), b"console.log(1)");
}
