//! CDP browser connection.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::CdpError;
use crate::protocol::{BrowserVersion, CdpResponse};
use crate::session::TargetSession;
use crate::transport::{CommandChannel, PendingMap, WsSource};

/// Event channels keyed by session id. The receive loop routes every
/// event to the session it belongs to; session-less events are dropped.
type EventRoutes = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<CdpResponse>>>>;

/// Connection to the browser's devtools endpoint.
///
/// Owns the WebSocket and a background receive task that correlates
/// command replies by id and routes events by session id. Browser-level
/// commands (context and target lifecycle) are issued directly on this
/// type; page-level work goes through an attached [`TargetSession`].
pub struct CdpClient {
    channel: CommandChannel,
    event_routes: EventRoutes,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the browser at the given devtools endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - devtools HTTP endpoint (e.g. "http://localhost:9222")
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();

        // Discover the browser WebSocket URL
        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?;

        debug!("Connected to browser: {}", version.browser);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (sink, source) = ws_stream.split();
        let channel = CommandChannel::new(sink);
        let event_routes: EventRoutes = Arc::new(Mutex::new(HashMap::new()));

        let recv_task = {
            let pending = channel.pending();
            let event_routes = event_routes.clone();
            tokio::spawn(async move {
                Self::receive_loop(source, pending, event_routes).await;
            })
        };

        debug!(
            "CDP client connected to {}",
            version.web_socket_debugger_url
        );

        Ok(Self {
            channel,
            event_routes,
            recv_task,
        })
    }

    /// WebSocket receive loop.
    async fn receive_loop(mut source: WsSource, pending: PendingMap, event_routes: EventRoutes) {
        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => {
                            if let Some(id) = resp.id {
                                // Command reply
                                let slot = pending.lock().remove(&id);
                                if let Some(slot) = slot {
                                    let result = if let Some(error) = resp.error {
                                        Err(CdpError::Protocol {
                                            code: error.code,
                                            message: error.message,
                                        })
                                    } else {
                                        Ok(resp.result.unwrap_or(Value::Null))
                                    };
                                    let _ = slot.tx.send(result);
                                }
                            } else if resp.method.is_some() {
                                // Event
                                let session_id = resp.session_id.clone().unwrap_or_default();
                                let routes = event_routes.lock();
                                if let Some(tx) = routes.get(&session_id) {
                                    let _ = tx.send(resp);
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse CDP message: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    /// Send a browser-level CDP command and wait for its reply.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel.invoke(method, params, None).await
    }

    // ========================================================================
    // Context and Target Lifecycle
    // ========================================================================

    /// Create an isolated browser context (separate cookies/storage).
    pub async fn create_browser_context(&self) -> Result<String, CdpError> {
        let result = self.call("Target.createBrowserContext", None).await?;
        result["browserContextId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CdpError::InvalidResponse("missing browserContextId".to_string()))
    }

    /// Dispose a browser context. Any targets still inside it are killed
    /// by the browser, so close them first.
    pub async fn dispose_browser_context(&self, context_id: &str) -> Result<(), CdpError> {
        self.call(
            "Target.disposeBrowserContext",
            Some(json!({"browserContextId": context_id})),
        )
        .await?;
        debug!("Disposed browser context {}", context_id);
        Ok(())
    }

    /// Create a blank page target inside the given context.
    pub async fn create_target(&self, context_id: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.createTarget",
                Some(json!({
                    "url": "about:blank",
                    "browserContextId": context_id,
                })),
            )
            .await?;
        result["targetId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CdpError::InvalidResponse("missing targetId".to_string()))
    }

    /// Close a page target. The browser acknowledges with a success flag.
    pub async fn close_target(&self, target_id: &str) -> Result<(), CdpError> {
        let result = self
            .call("Target.closeTarget", Some(json!({"targetId": target_id})))
            .await?;
        if result["success"].as_bool().unwrap_or(false) {
            debug!("Closed target {}", target_id);
            Ok(())
        } else {
            Err(CdpError::InvalidResponse(format!(
                "close of target {} refused",
                target_id
            )))
        }
    }

    /// Attach to a target, yielding the session used for page-level work.
    pub async fn attach(&self, target_id: &str) -> Result<TargetSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("missing sessionId".to_string()))?
            .to_string();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_routes.lock().insert(session_id.clone(), event_tx);

        Ok(TargetSession::new(
            target_id.to_string(),
            session_id,
            self.channel.clone(),
            event_rx,
        ))
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on this port; discovery must fail cleanly.
        let result = CdpClient::connect("http://127.0.0.1:1").await;
        assert!(matches!(result, Err(CdpError::BrowserNotAvailable(_))));
    }

    #[test]
    fn test_event_routes_by_session() {
        let routes: EventRoutes = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        routes.lock().insert("S1".to_string(), tx);

        let event: CdpResponse = serde_json::from_str(
            r#"{"method":"Page.loadEventFired","params":{},"sessionId":"S1"}"#,
        )
        .unwrap();
        let session_id = event.session_id.clone().unwrap_or_default();
        routes.lock().get(&session_id).unwrap().send(event).unwrap();

        let routed = rx.try_recv().unwrap();
        assert_eq!(routed.method.as_deref(), Some("Page.loadEventFired"));
    }
}
