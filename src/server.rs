//! Server initialization and startup logic for Pagelift.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagelift_config::{Config, ConfigLoader, LoggingConfig};
use pagelift_proxy::{authorize, render_response, GateState, Origin, RenderSettings, RenderState};

use crate::upstream::{self, UpstreamContext};

/// Initialize tracing with console output and, when configured, daily
/// rotated log files.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true));

    match &logging.dir {
        Some(dir) => {
            let dir = PathBuf::from(ConfigLoader::expand_path(&dir.to_string_lossy()));
            std::fs::create_dir_all(&dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("pagelift")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer guard alive for the program duration.
            static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
            let _ = GUARD.set(guard);

            registry
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

/// Build the full request pipeline.
///
/// Inside-out: upstream forwarder, rendering middleware, then (when
/// enabled) the authorization gate. The finished router is installed
/// into the [`Origin`] handle so both middlewares can re-enter it for
/// their sub-requests.
pub(crate) fn build_router(config: &Config) -> anyhow::Result<Router> {
    let origin = Origin::new();

    let upstream_ctx = UpstreamContext::new(&config.upstream.url)?;
    let settings = RenderSettings {
        devtools_url: config.render.devtools_url.clone(),
        content_types: config.render.content_types.clone(),
        navigation_timeout: Duration::from_secs(config.render.navigation_timeout_secs),
        max_body_bytes: config.render.max_body_bytes,
        forced_scheme: config.render.forced_scheme.clone(),
    };

    let mut app = Router::new()
        .fallback(upstream::forward)
        .with_state(upstream_ctx)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            RenderState::new(settings, origin.clone()),
            render_response,
        ));

    if config.gate.enabled {
        app = app.layer(middleware::from_fn_with_state(
            GateState::new(config.gate.uri.clone(), origin.clone()),
            authorize,
        ));
    }

    origin.install(app.clone());
    Ok(app)
}

/// Run the server in foreground.
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let app = build_router(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Pagelift v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    info!("Forwarding to upstream {}", config.upstream.url);
    info!("Rendering via devtools at {}", config.render.devtools_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Config wired to a mock upstream, with the devtools endpoint
    /// pointing at a dead port so any attempted render fails fast.
    fn test_config(upstream_url: &str) -> Config {
        let mut config = Config::default();
        config.upstream.url = upstream_url.to_string();
        config.render.devtools_url = "http://127.0.0.1:1".to_string();
        config.render.navigation_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_non_html_passes_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let app = build_router(&test_config(&server.uri())).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/data.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // No browsing occurred (the devtools endpoint is dead); the
        // response is the upstream's, byte for byte.
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_html_render_failure_is_502_with_no_partial_markup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hi</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let app = build_router(&test_config(&server.uri())).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/page")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!body.windows(4).any(|w| w == b"html"));
    }

    #[tokio::test]
    async fn test_gate_denial_stops_request_before_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        // The protected page must never be requested.
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.gate.enabled = true;

        let app = build_router(&config).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/page")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_gate_approval_lets_request_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("payload", "application/json"))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.gate.enabled = true;

        let app = build_router(&config).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/data.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test]
    async fn test_upstream_error_headers_do_not_trigger_render() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_raw("not found", "text/plain"))
            .mount(&server)
            .await;

        let app = build_router(&test_config(&server.uri())).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"not found");
    }

    #[test]
    fn test_build_router_rejects_bad_upstream() {
        let mut config = Config::default();
        config.upstream.url = "not a url".to_string();
        assert!(build_router(&config).is_err());
    }
}
