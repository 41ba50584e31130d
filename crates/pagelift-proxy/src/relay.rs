//! Request relay: the interception loop.
//!
//! Consumes the browser's stream of paused outbound requests. The
//! primary navigation is answered from the already-captured document;
//! everything else is synthesized by re-entering the origin pipeline.
//! Exchanges are processed strictly one at a time, in arrival order.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use pagelift_cdp::{HeaderEntry, RequestPausedEvent, TargetSession};

use crate::capture::CapturedResponse;
use crate::error::ProxyError;
use crate::origin::{Origin, SubResponse};

/// Resource type the browser reports for top-level documents.
const DOCUMENT: &str = "Document";

/// What a paused exchange resolves to. Both variants expose the same
/// {status, headers, body} contract, so fulfillment encoding is written
/// once.
pub(crate) enum RelaySource<'a> {
    /// The primary navigation: the captured document, reused verbatim.
    Document(&'a CapturedResponse),
    /// A sub-resource response synthesized through the origin pipeline.
    Synthesized(SubResponse),
}

impl RelaySource<'_> {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            RelaySource::Document(captured) => captured.status(),
            RelaySource::Synthesized(sub) => sub.status,
        }
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        match self {
            RelaySource::Document(captured) => captured.headers(),
            RelaySource::Synthesized(sub) => &sub.headers,
        }
    }

    pub(crate) fn body(&self) -> &[u8] {
        match self {
            RelaySource::Document(captured) => captured.body(),
            RelaySource::Synthesized(sub) => &sub.body,
        }
    }
}

/// The pause that *is* the navigation: a document request whose URL
/// exactly equals the one the driver navigated to.
pub(crate) fn is_primary_navigation(event: &RequestPausedEvent, navigation_url: &str) -> bool {
    event.resource_type == DOCUMENT && event.request.url == navigation_url
}

/// Decode the pause event's string-keyed header map. An absent map is an
/// empty one; anything else malformed is an error.
pub(crate) fn decode_header_map(raw: &Value) -> Result<HeaderMap, ProxyError> {
    let mut headers = HeaderMap::new();
    if raw.is_null() {
        return Ok(headers);
    }
    let object = raw
        .as_object()
        .ok_or_else(|| ProxyError::HeaderDecode("not a string map".to_string()))?;
    for (name, value) in object {
        let value = value
            .as_str()
            .ok_or_else(|| ProxyError::HeaderDecode(format!("{} is not a string", name)))?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProxyError::HeaderDecode(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProxyError::HeaderDecode(format!("{}: {}", name, e)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Flatten a header multimap into fulfillment entries, one per value.
pub(crate) fn flatten_headers(headers: &HeaderMap) -> Vec<HeaderEntry> {
    headers
        .iter()
        .map(|(name, value)| HeaderEntry {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

/// Build the sub-request that re-enters the origin pipeline: the paused
/// request's method, URL and headers, passed through as given.
fn build_sub_request(event: &RequestPausedEvent) -> Result<Request<Body>, ProxyError> {
    let headers = decode_header_map(&event.request.headers)?;
    let mut request = Request::builder()
        .method(event.request.method.as_str())
        .uri(event.request.url.as_str())
        .body(Body::empty())
        .map_err(|e| ProxyError::SubRequest(e.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Resolve one paused exchange to the response that will fulfill it.
///
/// A failed sub-request resolves to an empty 502 instead of killing the
/// operation: the browser must never be left with a permanently blocked
/// request.
pub(crate) async fn resolve<'a>(
    event: &RequestPausedEvent,
    captured: &'a CapturedResponse,
    origin: &Origin,
    navigation_url: &str,
    max_body_bytes: usize,
) -> RelaySource<'a> {
    if is_primary_navigation(event, navigation_url) {
        trace!("Serving primary navigation from the captured response");
        return RelaySource::Document(captured);
    }

    let outcome = match build_sub_request(event) {
        Ok(request) => origin.dispatch_collect(request, max_body_bytes).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(sub) => RelaySource::Synthesized(sub),
        Err(e) => {
            warn!("Sub-request for {} failed: {}", event.request.url, e);
            RelaySource::Synthesized(SubResponse::server_error())
        }
    }
}

/// The interception loop for one rendering operation.
pub(crate) struct RelayLoop {
    pub session: Arc<TargetSession>,
    pub origin: Origin,
    pub captured: Arc<CapturedResponse>,
    pub navigation_url: String,
    pub max_body_bytes: usize,
}

impl RelayLoop {
    /// Consume pause notifications until the cancellation signal fires or
    /// the event channel closes; both are normal shutdown. The next pause
    /// is not taken until the previous fulfillment has been issued.
    pub(crate) async fn run(
        self,
        mut pauses: mpsc::UnboundedReceiver<Value>,
        cancel: CancellationToken,
    ) {
        loop {
            let params = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Relay loop stopped: operation ending");
                    break;
                }
                params = pauses.recv() => match params {
                    Some(params) => params,
                    None => {
                        debug!("Relay loop stopped: event channel closed");
                        break;
                    }
                },
            };

            let event: RequestPausedEvent = match serde_json::from_value(params) {
                Ok(event) => event,
                Err(e) => {
                    // Without a request id there is nothing to fulfill.
                    warn!("Unparseable pause notification: {}", e);
                    continue;
                }
            };

            trace!(
                url = %event.request.url,
                resource_type = %event.resource_type,
                "Request paused"
            );

            let source = resolve(
                &event,
                &self.captured,
                &self.origin,
                &self.navigation_url,
                self.max_body_bytes,
            )
            .await;

            let entries = flatten_headers(source.headers());
            if let Err(e) = self
                .session
                .fulfill_request(
                    &event.request_id,
                    source.status().as_u16(),
                    &entries,
                    source.body(),
                )
                .await
            {
                // Command channel gone; the driver's load wait surfaces
                // the failure to the operation.
                warn!("Fulfillment for {} failed: {}", event.request_id, e);
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
