//! Target session: command scope and event stream for a single page.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::CdpError;
use crate::protocol::{CdpResponse, ExceptionDetails, HeaderEntry};
use crate::transport::CommandChannel;

/// Event senders keyed by CDP method name.
type Subscribers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>>;

/// A session attached to a single page target.
///
/// Commands issued here carry the session id, scoping them to the target.
/// Incoming events for the session are demultiplexed by method name into
/// per-subscription channels, so independent consumers (a load-event
/// waiter, an interception loop) each get their own stream.
pub struct TargetSession {
    target_id: String,
    session_id: String,
    channel: CommandChannel,
    subscribers: Subscribers,
    demux_task: tokio::task::JoinHandle<()>,
}

impl TargetSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        channel: CommandChannel,
        mut events: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));

        let demux_task = {
            let subscribers = subscribers.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    let Some(method) = event.method else { continue };
                    let params = event.params.unwrap_or(Value::Null);
                    let stale = {
                        let subs = subscribers.lock();
                        match subs.get(&method) {
                            Some(tx) => tx.send(params).is_err(),
                            None => {
                                trace!("Unrouted event {}", method);
                                false
                            }
                        }
                    };
                    if stale {
                        subscribers.lock().remove(&method);
                    }
                }
                // Sender side gone: dropping the subscriber map closes
                // every subscription, which consumers see as end-of-stream.
            })
        };

        Self {
            target_id,
            session_id,
            channel,
            subscribers,
            demux_task,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to a CDP event by method name (e.g. "Page.loadEventFired").
    ///
    /// Register subscriptions before enabling the domain that emits them,
    /// or early events are dropped. A later subscribe for the same method
    /// replaces the earlier one.
    pub fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(method.to_string(), tx);
        rx
    }

    /// Send a CDP command scoped to this session and wait for its reply.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel
            .invoke(method, params, Some(&self.session_id))
            .await
    }

    // ========================================================================
    // Domains
    // ========================================================================

    /// Enable page-lifecycle notifications.
    pub async fn enable_page(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        Ok(())
    }

    /// Enable request interception: every outbound request pauses until
    /// fulfilled.
    pub async fn enable_fetch(&self) -> Result<(), CdpError> {
        self.call("Fetch.enable", Some(json!({}))).await?;
        debug!("Fetch interception enabled for session {}", self.session_id);
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigate to URL. Fails if the navigate command itself errors or
    /// reports an error text; does NOT wait for the load event.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(CdpError::Navigation(error.to_string()));
            }
        }

        debug!("Navigating to {}", url);
        Ok(())
    }

    // ========================================================================
    // JavaScript Execution
    // ========================================================================

    /// Evaluate a JavaScript expression, returning its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let details: ExceptionDetails = serde_json::from_value(exception.clone())?;
            return Err(CdpError::Script(details.describe()));
        }

        Ok(result["result"]["value"].clone())
    }

    // ========================================================================
    // Fetch Interception
    // ========================================================================

    /// Fulfill a paused request with the given response. Header
    /// multiplicity is preserved: callers pass one entry per value.
    pub async fn fulfill_request(
        &self,
        request_id: &str,
        status: u16,
        headers: &[HeaderEntry],
        body: &[u8],
    ) -> Result<(), CdpError> {
        self.call(
            "Fetch.fulfillRequest",
            Some(fulfill_params(request_id, status, headers, body)),
        )
        .await?;
        trace!("Fulfilled {} with status {}", request_id, status);
        Ok(())
    }
}

impl Drop for TargetSession {
    fn drop(&mut self) {
        self.demux_task.abort();
    }
}

/// Build `Fetch.fulfillRequest` params. The body crosses the wire
/// base64-encoded so binary responses survive transport.
fn fulfill_params(request_id: &str, status: u16, headers: &[HeaderEntry], body: &[u8]) -> Value {
    json!({
        "requestId": request_id,
        "responseCode": status,
        "responseHeaders": headers,
        "body": BASE64.encode(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfill_params_shape() {
        let headers = vec![
            HeaderEntry {
                name: "Content-Type".to_string(),
                value: "text/html".to_string(),
            },
            HeaderEntry {
                name: "Set-Cookie".to_string(),
                value: "a=1".to_string(),
            },
            HeaderEntry {
                name: "Set-Cookie".to_string(),
                value: "b=2".to_string(),
            },
        ];
        let params = fulfill_params("job-1", 200, &headers, b"<html></html>");

        assert_eq!(params["requestId"], "job-1");
        assert_eq!(params["responseCode"], 200);
        // One entry per value, multiplicity preserved
        let entries = params["responseHeaders"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1]["name"], "Set-Cookie");
        assert_eq!(entries[2]["value"], "b=2");
    }

    #[test]
    fn test_fulfill_params_body_base64() {
        let params = fulfill_params("job-2", 200, &[], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(params["body"], "3q2+7w==");
    }

    #[test]
    fn test_fulfill_params_empty_body() {
        let params = fulfill_params("job-3", 502, &[], b"");
        assert_eq!(params["body"], "");
        assert_eq!(params["responseCode"], 502);
    }
}
