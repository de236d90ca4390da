#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use prs_core::models::ServiceConfig;
use prs_core::services::{ConfigStore, PortPicker, RestartOrchestrator};
use prs_core::test_support::{write_pangolin_dir, ScriptedRunner};
use prs_daemon::http::create_router;
use prs_daemon::logging::{FilterLayer, LogLevel};
use prs_daemon::state::ApiState;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub dir: TempDir,
    pub runner: Arc<ScriptedRunner>,
    pub state: Arc<ApiState>,
    pub router: Router,
    /// Keeps the log level handle live.
    pub filter: FilterLayer,
}

/// A router over a scratch pangolin directory and a scripted runner.
pub fn test_app(runner: ScriptedRunner) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    write_pangolin_dir(dir.path()).unwrap();

    let mut config = ServiceConfig::default();
    config.pangolin.directory = dir.path().to_path_buf();
    config.docker.use_sudo = false;
    config.service.log_to_file = false;
    let store = Arc::new(ConfigStore::with_config(
        dir.path().join("service_config.json"),
        config,
    ));

    let runner = Arc::new(runner);
    let orchestrator = Arc::new(
        RestartOrchestrator::new(Arc::clone(&store), runner.clone())
            .with_port_picker(PortPicker::seeded(42)),
    );
    let (filter, log_level) = LogLevel::reloadable("info");
    let state = Arc::new(ApiState::new(store, orchestrator).with_log_level(log_level));
    let router = create_router(Arc::clone(&state));
    TestApp {
        dir,
        runner,
        state,
        router,
        filter,
    }
}

/// Send one request through the router; returns the status and JSON body.
pub async fn send(router: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let content_type = body.map(|_| "application/json");
    send_as(router, method, uri, content_type, body.unwrap_or_default()).await
}

/// Like [`send`], with an explicit content type.
pub async fn send_as(
    router: Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        request = request.header(header::CONTENT_TYPE, content_type);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
