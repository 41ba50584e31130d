//! CDP protocol types and message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response message. Covers both command replies (`id` set) and
/// events (`method` set).
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP error in response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

// ============================================================================
// Fetch Domain Types
// ============================================================================

/// `Fetch.requestPaused` event payload: one browser-initiated request
/// blocked awaiting a fulfillment decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPausedEvent {
    /// Correlation token; every fulfillment must echo it.
    pub request_id: String,
    pub request: PausedRequest,
    pub frame_id: Option<String>,
    /// Resource kind as reported by the browser ("Document", "Script", ...).
    pub resource_type: String,
}

/// The outbound request description inside a pause event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedRequest {
    pub url: String,
    pub method: String,
    /// String-keyed header map, kept raw until the relay decodes it.
    #[serde(default)]
    pub headers: Value,
    pub post_data: Option<String>,
}

/// One name/value pair in a fulfillment's flattened header list. A header
/// with multiple values produces one entry per value.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

// ============================================================================
// Runtime Types
// ============================================================================

/// Exception details from `Runtime.evaluate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: i64,
    pub text: String,
    pub line_number: i64,
    pub column_number: i64,
    pub url: Option<String>,
}

impl ExceptionDetails {
    /// Human-readable one-liner for error messages.
    pub fn describe(&self) -> String {
        format!("{} (line {})", self.text, self.line_number)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
