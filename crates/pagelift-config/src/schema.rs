//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Origin server the proxy forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
        }
    }
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

/// Rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Chrome devtools endpoint.
    #[serde(default = "default_devtools_url")]
    pub devtools_url: String,

    /// A response is rendered iff its Content-Type contains one of these
    /// entries as a substring.
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,

    /// How long to wait for the page's load event.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Upper bound for a buffered response body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Force "http" or "https" in the navigation URL instead of deriving
    /// the scheme from the inbound request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_scheme: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            devtools_url: default_devtools_url(),
            content_types: default_content_types(),
            navigation_timeout_secs: default_navigation_timeout(),
            max_body_bytes: default_max_body_bytes(),
            forced_scheme: None,
        }
    }
}

fn default_devtools_url() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_content_types() -> Vec<String> {
    vec!["text/html".to_string()]
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

/// Sub-request authorization gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub enabled: bool,

    /// URI the authorization sub-request is sent to.
    #[serde(default = "default_gate_uri")]
    pub uri: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: default_gate_uri(),
        }
    }
}

fn default_gate_uri() -> String {
    "/auth".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// When set, logs are also written to daily-rotated files here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
