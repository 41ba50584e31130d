//! Rendering proxy core.
//!
//! Wraps an axum pipeline so that HTML responses are executed in a
//! headless browser before reaching the client: the original response is
//! buffered, the page is loaded in an isolated browser context with
//! request interception enabled, every browser sub-request is relayed
//! back into the same pipeline, and the fully rendered DOM replaces the
//! buffered body.
//!
//! The pieces, in request order:
//!
//! - [`gate::authorize`] (optional) denies or admits the request based on
//!   an authorization sub-request through the pipeline itself.
//! - [`middleware::render_response`] captures eligible responses and
//!   drives the rendering operation.
//! - [`Origin`] is the re-entry handle both of them dispatch through.
//!
//! A rendering operation owns exactly one browser context and one page
//! target; both are torn down before the response is written, on success
//! and on every failure path.

mod capture;
mod error;
mod gate;
mod middleware;
mod origin;
mod relay;
mod render;
mod rewrite;

pub use capture::{capture_if_eligible, content_type_matches, CaptureOutcome, CapturedResponse};
pub use error::ProxyError;
pub use gate::{authorize, GateState};
pub use middleware::{render_response, RenderState};
pub use origin::{Origin, SubResponse};
pub use render::{render_page, RenderSettings};
pub use rewrite::rewrite_document;
