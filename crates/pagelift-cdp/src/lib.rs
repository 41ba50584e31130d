//! Chrome DevTools Protocol (CDP) client for the rendering proxy.
//!
//! Connects to a Chrome/Chromium instance over WebSocket and speaks the
//! CDP JSON-RPC protocol. The surface is deliberately narrow: browser
//! context and target lifecycle, navigation, script evaluation, and the
//! Fetch interception domain (paused requests and their fulfillment) —
//! the commands a rendering operation needs, nothing more.
//!
//! ## Usage
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --headless --remote-debugging-port=9222
//!    ```
//!
//! 2. Open an isolated context and drive a page:
//!    ```rust,ignore
//!    let client = CdpClient::connect("http://localhost:9222").await?;
//!    let context_id = client.create_browser_context().await?;
//!    let target_id = client.create_target(&context_id).await?;
//!    let session = client.attach(&target_id).await?;
//!    session.enable_page().await?;
//!    session.navigate("http://localhost:8080/").await?;
//!    ```

mod client;
mod error;
mod protocol;
mod session;
mod transport;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::{
    BrowserVersion, CdpErrorResponse, CdpRequest, CdpResponse, ExceptionDetails, HeaderEntry,
    PausedRequest, RequestPausedEvent,
};
pub use session::TargetSession;
