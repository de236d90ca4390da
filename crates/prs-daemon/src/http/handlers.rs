use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, StatusCode};
use axum::{Form, Json};
use prs_core::models::{ListenerSettings, PortRange, RestartResult, ServiceConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::{HttpError, HttpResult};
use crate::state::ApiState;

pub const RESTART_COMMAND: &str = "restart_pangolin";
pub const SERVICE_NAME: &str = "pangolin-restart-service";

#[derive(Debug, Default, Deserialize)]
pub struct RestartRequest {
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestartResponse {
    pub status: String,
    #[serde(flatten)]
    pub result: RestartResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime_seconds: u64,
    pub restart_in_progress: bool,
    pub last_restart: Option<RestartResult>,
    pub config: HealthConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthConfig {
    pub port_range: PortRange,
    pub pangolin_directory: PathBuf,
    pub listen_port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdateResponse {
    pub status: String,
    pub message: String,
    pub config: ServiceConfig,
}

/// Liveness plus a summary of the effective configuration. Never waits on a
/// running restart.
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let config = state.config.get().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        restart_in_progress: state.orchestrator.is_restart_in_progress(),
        last_restart: state.orchestrator.last_result().await,
        config: HealthConfig {
            port_range: config.port_range,
            pangolin_directory: config.pangolin.directory,
            listen_port: config.service.listen_port,
        },
    })
}

/// `POST /restart` with `{"command": "restart_pangolin"}`, or the same
/// field form-encoded.
///
/// 200 on success, 409 while another restart runs, 500 for any other failure.
pub async fn restart(
    State(state): State<Arc<ApiState>>,
    request: Request,
) -> HttpResult<(StatusCode, Json<RestartResponse>)> {
    let command = read_command(request).await;
    if command.as_deref() != Some(RESTART_COMMAND) {
        return Err(HttpError::bad_request(format!(
            "Invalid command. Expected '{RESTART_COMMAND}'"
        )));
    }
    tracing::info!("restart_requested");

    let result = Arc::clone(&state.orchestrator).spawn_restart().await;
    let status = if result.success {
        StatusCode::OK
    } else if result.is_busy() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = RestartResponse {
        status: if result.success { "success" } else { "error" }.to_string(),
        result,
    };
    Ok((status, Json(body)))
}

/// The `command` field of a JSON or form-encoded body.
async fn read_command(request: Request) -> Option<String> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        return match Form::<RestartRequest>::from_request(request, &()).await {
            Ok(Form(body)) => body.command,
            Err(rejection) => {
                tracing::debug!(error = %rejection, "unreadable form body");
                None
            }
        };
    }

    let body = match Bytes::from_request(request, &()).await {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable request body");
            return None;
        }
    };
    match serde_json::from_slice::<RestartRequest>(&body) {
        Ok(body) => body.command,
        Err(e) => {
            tracing::debug!(error = %e, "restart body is not a JSON command");
            None
        }
    }
}

pub async fn get_config(State(state): State<Arc<ApiState>>) -> Json<ServiceConfig> {
    Json(state.config.get().await)
}

/// Deep-merge a partial document into the configuration and persist it.
pub async fn update_config(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> HttpResult<Json<ConfigUpdateResponse>> {
    let partial: Value = serde_json::from_slice(&body)
        .map_err(|e| HttpError::bad_request(format!("Invalid JSON body: {e}")))?;
    if partial.as_object().is_some_and(|o| o.is_empty()) {
        return Err(HttpError::bad_request("No JSON data provided"));
    }

    let previous = state.config.get().await;
    let config = state.config.update(partial).await?;
    if config.service.log_level != previous.service.log_level {
        if let Some(level) = &state.log_level {
            if let Err(e) = level.set(config.log_directive()) {
                tracing::warn!(error = %e, "could not apply new log level");
            }
        }
    }
    if restart_bound(&config.service) != restart_bound(&previous.service) {
        tracing::warn!("listener and log file settings take effect on the next daemon start");
    }
    Ok(Json(ConfigUpdateResponse {
        status: "success".to_string(),
        message: "Configuration updated".to_string(),
        config,
    }))
}

/// Listener settings that only a daemon restart can apply.
fn restart_bound(s: &ListenerSettings) -> (&str, u16, bool, &str) {
    (&s.listen_host, s.listen_port, s.log_to_file, &s.log_file)
}
