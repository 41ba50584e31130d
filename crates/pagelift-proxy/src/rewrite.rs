//! Response rewriting: substitute the rendered markup for the captured body.

use axum::body::Body;
use axum::http::{header, HeaderName};
use axum::response::Response;

use crate::capture::CapturedResponse;

const DOCTYPE: &str = "<!doctype html>\n";

/// Headers that described the original body and no longer hold: length,
/// byte-range support, cache validators.
const STALE_HEADERS: [HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::ETAG,
    header::LAST_MODIFIED,
];

/// Build the final client response: the captured status and headers
/// (minus the stale ones) with the rendered markup as the body, prefixed
/// with a doctype since `outerHTML` does not include one.
pub fn rewrite_document(captured: &CapturedResponse, markup: &str) -> Response {
    let mut headers = captured.headers().clone();
    for name in STALE_HEADERS {
        headers.remove(name);
    }

    let mut body = String::with_capacity(DOCTYPE.len() + markup.len());
    body.push_str(DOCTYPE);
    body.push_str(markup);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = captured.status();
    *response.headers_mut() = headers;
    response
}
