//! Rendering proxy errors.

use thiserror::Error;

use pagelift_cdp::CdpError;

/// Errors raised by the rendering pipeline.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Browser automation failure (transport, navigation, script, ...).
    #[error("Browser automation error: {0}")]
    Cdp(#[from] CdpError),

    /// The origin re-entry handle was used before the router was installed.
    #[error("Origin pipeline not installed")]
    OriginUnavailable,

    /// Buffering a response body failed.
    #[error("Failed to buffer response body: {0}")]
    BodyCollect(String),

    /// The response body exceeds the configured render limit.
    #[error("Response body exceeds render limit of {0} bytes")]
    BodyTooLarge(usize),

    /// A paused request carried a header map that could not be decoded.
    #[error("Malformed pause headers: {0}")]
    HeaderDecode(String),

    /// A paused request could not be turned into an origin sub-request.
    #[error("Failed to build sub-request: {0}")]
    SubRequest(String),

    /// The page never reported load-complete.
    #[error("Page load did not complete within {0} seconds")]
    LoadTimeout(u64),

    /// Markup extraction returned something other than a string.
    #[error("Rendered markup was not a string")]
    MarkupDecode,

    /// The rendering operation was canceled (client went away).
    #[error("Rendering canceled")]
    Canceled,
}
