//! CDP error types.

use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No browser answering on the devtools endpoint.
    #[error("Browser not available at {0}. Start Chrome with: chrome --headless --remote-debugging-port=9222")]
    BrowserNotAvailable(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Error reply from the browser.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Navigation reported an error text.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script evaluation raised an exception in the page.
    #[error("Script exception: {0}")]
    Script(String),

    /// Command reply did not arrive in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The connection went away while a command was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Reply arrived but was missing an expected field.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}
