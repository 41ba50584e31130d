//! Render driver: browser session lifecycle, navigation, markup extraction.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pagelift_cdp::{CdpClient, CdpError, TargetSession};

use crate::capture::CapturedResponse;
use crate::error::ProxyError;
use crate::origin::Origin;
use crate::relay::RelayLoop;

/// Expression extracting the fully rendered markup.
const OUTER_HTML: &str = "document.documentElement.outerHTML";

/// Renderer settings. The binary maps its config file onto this.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Chrome devtools endpoint.
    pub devtools_url: String,
    /// Content types (substring match) that trigger rendering.
    pub content_types: Vec<String>,
    /// How long to wait for the page's load event.
    pub navigation_timeout: Duration,
    /// Upper bound for buffered bodies (document and sub-resources).
    pub max_body_bytes: usize,
    /// Force the navigation URL scheme instead of deriving it.
    pub forced_scheme: Option<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            devtools_url: "http://127.0.0.1:9222".to_string(),
            content_types: vec!["text/html".to_string()],
            navigation_timeout: Duration::from_secs(30),
            max_body_bytes: 16 * 1024 * 1024,
            forced_scheme: None,
        }
    }
}

/// Browser resources of one rendering operation.
///
/// Acquired in order (context, then target, then session); `close`
/// releases whatever exists in reverse order, best-effort. It runs on
/// every exit path of [`render_page`], so the invariant — one context,
/// one target, both gone before the operation returns — holds on
/// failures too.
struct BrowserLease {
    client: CdpClient,
    context_id: Option<String>,
    target_id: Option<String>,
}

impl BrowserLease {
    async fn connect(devtools_url: &str) -> Result<Self, ProxyError> {
        let client = CdpClient::connect(devtools_url).await?;
        Ok(Self {
            client,
            context_id: None,
            target_id: None,
        })
    }

    async fn create_context(&mut self) -> Result<String, ProxyError> {
        let id = self.client.create_browser_context().await?;
        self.context_id = Some(id.clone());
        Ok(id)
    }

    async fn create_target(&mut self, context_id: &str) -> Result<String, ProxyError> {
        let id = self.client.create_target(context_id).await?;
        self.target_id = Some(id.clone());
        Ok(id)
    }

    async fn attach(&self, target_id: &str) -> Result<TargetSession, ProxyError> {
        Ok(self.client.attach(target_id).await?)
    }

    /// Tear down whatever was created: target before context. Errors are
    /// logged, not escalated; the operation's primary result stands.
    async fn close(&mut self) {
        if let Some(target_id) = self.target_id.take() {
            if let Err(e) = self.client.close_target(&target_id).await {
                warn!("Failed to close target {}: {}", target_id, e);
            }
        }
        if let Some(context_id) = self.context_id.take() {
            if let Err(e) = self.client.dispose_browser_context(&context_id).await {
                warn!("Failed to dispose browser context {}: {}", context_id, e);
            }
        }
        // Dropping the client closes the control channel.
    }
}

/// Render the captured document in an isolated browser session and
/// return the resulting markup.
///
/// The relay loop for the session runs concurrently and is stopped, and
/// the browser context and target are torn down, before this returns —
/// whatever the outcome.
pub async fn render_page(
    settings: Arc<RenderSettings>,
    origin: Origin,
    captured: Arc<CapturedResponse>,
    navigation_url: String,
    cancel: CancellationToken,
) -> Result<String, ProxyError> {
    let mut lease = BrowserLease::connect(&settings.devtools_url).await?;
    let result = drive(
        &mut lease,
        &settings,
        origin,
        captured,
        &navigation_url,
        &cancel,
    )
    .await;
    lease.close().await;
    result
}

async fn drive(
    lease: &mut BrowserLease,
    settings: &RenderSettings,
    origin: Origin,
    captured: Arc<CapturedResponse>,
    navigation_url: &str,
    cancel: &CancellationToken,
) -> Result<String, ProxyError> {
    // Cancellation covers every automation call: an abandoned phase
    // falls through to the caller's teardown instead of blocking.
    let session = tokio::select! {
        _ = cancel.cancelled() => return Err(ProxyError::Canceled),
        session = async {
            let context_id = lease.create_context().await?;
            let target_id = lease.create_target(&context_id).await?;
            Ok::<_, ProxyError>(Arc::new(lease.attach(&target_id).await?))
        } => session?,
    };

    // Subscriptions must exist before the domains start emitting.
    let mut load_events = session.subscribe("Page.loadEventFired");
    let pauses = session.subscribe("Fetch.requestPaused");

    // The interception loop runs beside the navigation wait; its intake
    // is stopped before the target goes away.
    let relay_cancel = cancel.child_token();
    let relay = RelayLoop {
        session: session.clone(),
        origin,
        captured,
        navigation_url: navigation_url.to_string(),
        max_body_bytes: settings.max_body_bytes,
    };
    let relay_task = tokio::spawn(relay.run(pauses, relay_cancel.clone()));

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Err(ProxyError::Canceled),
        outcome = async {
            session.enable_page().await?;
            session.enable_fetch().await?;
            session.navigate(navigation_url).await?;
            wait_for_load(&mut load_events, settings.navigation_timeout).await?;

            match session.evaluate(OUTER_HTML).await? {
                Value::String(markup) => Ok(markup),
                _ => Err(ProxyError::MarkupDecode),
            }
        } => outcome,
    };

    relay_cancel.cancel();
    if let Err(e) = relay_task.await {
        warn!("Relay task ended abnormally: {}", e);
    }

    outcome
}

/// Block until the browser reports load-complete or the timeout expires.
async fn wait_for_load(
    load_events: &mut mpsc::UnboundedReceiver<Value>,
    timeout: Duration,
) -> Result<(), ProxyError> {
    tokio::select! {
        _ = tokio::time::sleep(timeout) => Err(ProxyError::LoadTimeout(timeout.as_secs())),
        event = load_events.recv() => match event {
            Some(_) => {
                debug!("Load event fired");
                Ok(())
            }
            None => Err(ProxyError::Cdp(CdpError::ConnectionClosed)),
        },
    }
}
