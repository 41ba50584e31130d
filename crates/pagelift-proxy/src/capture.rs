//! Response capture: buffer eligible responses for rendering.

use axum::body::to_bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use tracing::debug;

use crate::error::ProxyError;

/// A fully buffered origin response: the document the browser will be
/// given when it requests the page it is rendering.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CapturedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Whether a response is captured: true iff the Content-Type contains at
/// least one allow-list entry as a substring (case-sensitive).
pub fn content_type_matches(allow_list: &[String], content_type: &str) -> bool {
    allow_list
        .iter()
        .any(|entry| content_type.contains(entry.as_str()))
}

/// Result of the capture decision.
pub enum CaptureOutcome {
    /// Content type not allow-listed; the response is untouched.
    PassThrough(Response),
    /// The response was buffered for rendering.
    Captured(CapturedResponse),
}

/// Buffer the response if its content type is allow-listed, otherwise
/// hand it back unchanged. A predicate mismatch is a normal skip, not an
/// error.
pub async fn capture_if_eligible(
    response: Response,
    allow_list: &[String],
    max_bytes: usize,
) -> Result<CaptureOutcome, ProxyError> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !content_type_matches(allow_list, content_type) {
        return Ok(CaptureOutcome::PassThrough(response));
    }

    // A declared length over the limit fails early, before buffering.
    if let Some(declared) = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > max_bytes {
            return Err(ProxyError::BodyTooLarge(max_bytes));
        }
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, max_bytes)
        .await
        .map_err(|e| ProxyError::BodyCollect(e.to_string()))?;

    debug!(
        status = %parts.status,
        bytes = bytes.len(),
        "Captured response for rendering"
    );

    Ok(CaptureOutcome::Captured(CapturedResponse::new(
        parts.status,
        parts.headers,
        bytes,
    )))
}
