
use super::*;
use crate::loader::ConfigLoader;

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_zero_port_rejected() {
    let mut config = Config::default();
    config.server.port = 0;
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "server.port");
}

#[test]
fn test_empty_host_rejected() {
    let mut config = Config::default();
    config.server.host.clear();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
}

#[test]
fn test_bad_upstream_url_rejected() {
    let mut config = Config::default();
    config.upstream.url = "not a url".to_string();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "upstream.url");
}

#[test]
fn test_non_http_upstream_scheme_rejected() {
    let mut config = Config::default();
    config.upstream.url = "ftp://127.0.0.1/files".to_string();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert!(result.errors[0].message.contains("ftp"));
}

#[test]
fn test_empty_content_types_rejected() {
    let mut config = Config::default();
    config.render.content_types.clear();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "render.content_types");
}

#[test]
fn test_empty_content_type_entry_rejected() {
    let mut config = Config::default();
    config.render.content_types.push(String::new());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
}

#[test]
fn test_bad_forced_scheme_rejected() {
    let mut config = Config::default();
    config.render.forced_scheme = Some("ws".to_string());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "render.forced_scheme");
}

#[test]
fn test_valid_forced_scheme_accepted() {
    let mut config = Config::default();
    config.render.forced_scheme = Some("https".to_string());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
}

#[test]
fn test_zero_timeout_rejected() {
    let mut config = Config::default();
    config.render.navigation_timeout_secs = 0;
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
}

#[test]
fn test_huge_timeout_warns() {
    let mut config = Config::default();
    config.render.navigation_timeout_secs = 600;
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_relative_gate_uri_rejected_when_enabled() {
    let mut config = Config::default();
    config.gate.enabled = true;
    config.gate.uri = "auth".to_string();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "gate.uri");
}

#[test]
fn test_relative_gate_uri_ignored_when_disabled() {
    let mut config = Config::default();
    config.gate.uri = "auth".to_string();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
}

#[test]
fn test_loaded_config_validates() {
    let config = ConfigLoader::load_str(
        r#"
        [server]
        port = 8443

        [render]
        content_types = ["text/html", "application/xhtml+xml"]
        "#,
    )
    .unwrap();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
}
