//! Shared command plumbing for the CDP WebSocket connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::trace;

use crate::error::CdpError;
use crate::protocol::CdpRequest;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Reply slot for an in-flight command.
pub(crate) struct PendingCommand {
    pub tx: oneshot::Sender<Result<Value, CdpError>>,
}

pub(crate) type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Command side of the CDP connection, shared between the browser-level
/// client and every attached target session.
#[derive(Clone)]
pub(crate) struct CommandChannel {
    sink: Arc<tokio::sync::Mutex<WsSink>>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl CommandChannel {
    pub(crate) fn new(sink: WsSink) -> Self {
        Self {
            sink: Arc::new(tokio::sync::Mutex::new(sink)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The pending map, handed to the receive loop for reply correlation.
    pub(crate) fn pending(&self) -> PendingMap {
        self.pending.clone()
    }

    /// Send a command and wait for the matching reply.
    pub(crate) async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingCommand { tx });

        {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("{} timed out", method)))
            }
        }
    }
}
