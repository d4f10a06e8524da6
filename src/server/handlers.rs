// src/server/handlers.rs

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AppState;
use crate::blocks::{self, BlockProgram};
use crate::robot::{ExecutorError, RobotCommand, RobotStatus, spawn_loopback_device};
use crate::service::{ExecutionRequest, PackageInstallRequest, TerminalRequest};

const INVALID_BODY: &str = "Invalid request body";

#[derive(Debug, Serialize)]
pub(super) struct StatusResponse {
    status: &'static str,
}

/// `{success, error}`, used for 500s and the robot run endpoint.
#[derive(Debug, Serialize)]
pub(super) struct AckResponse {
    success: bool,
    error: Option<String>,
}

impl AckResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RunRequest {
    #[serde(default)]
    commands: Vec<RobotCommand>,
}

type Rejection = (StatusCode, Json<AckResponse>);

fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &Bytes) -> Result<T, Rejection> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(endpoint, error = %e, "rejecting unparseable request body");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AckResponse::failed(INVALID_BODY)),
        )
    })
}

pub(super) async fn access_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    // Status is polled continuously by the UI.
    if uri == "/api/robot/status" {
        debug!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms = elapsed_ms,
            "http access"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms = elapsed_ms,
            "http access"
        );
    }
    response
}

pub(super) async fn healthz_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

pub(super) async fn execute_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ExecutionRequest = match parse_body("execute", &body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };
    Json(state.code.execute(request).await).into_response()
}

pub(super) async fn install_packages_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let request: PackageInstallRequest = match parse_body("packages", &body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };
    Json(state.packages.install(request).await).into_response()
}

pub(super) async fn list_packages_handler(State(state): State<AppState>) -> Response {
    Json(state.packages.list().await).into_response()
}

pub(super) async fn terminal_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TerminalRequest = match parse_body("terminal", &body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };
    Json(state.terminal.run(request).await).into_response()
}

pub(super) async fn compile_blocks_handler(body: Bytes) -> Response {
    let program: BlockProgram = match parse_body("blocks/compile", &body) {
        Ok(program) => program,
        Err(rejection) => return rejection.into_response(),
    };
    Json(blocks::compile(&program)).into_response()
}

pub(super) async fn robot_connect_handler(State(state): State<AppState>) -> Json<RobotStatus> {
    if !state.robot.is_connected() {
        let (channel, _device) = spawn_loopback_device();
        state.robot.connect(Arc::new(channel));
    }
    Json(state.status().snapshot())
}

pub(super) async fn robot_disconnect_handler(State(state): State<AppState>) -> Json<RobotStatus> {
    state.robot.disconnect();
    Json(state.status().snapshot())
}

pub(super) async fn robot_run_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RunRequest = match parse_body("robot/run", &body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };

    // The program runs in the background; progress is visible via status.
    match state.robot.start(request.commands) {
        Ok(_handle) => Json(AckResponse::ok()).into_response(),
        Err(err @ ExecutorError::AlreadyRunning) => {
            (StatusCode::CONFLICT, Json(AckResponse::failed(err.to_string()))).into_response()
        }
        Err(err @ ExecutorError::NotConnected) => {
            Json(AckResponse::failed(err.to_string())).into_response()
        }
    }
}

pub(super) async fn robot_stop_handler(State(state): State<AppState>) -> Json<RobotStatus> {
    state.robot.stop();
    Json(state.status().snapshot())
}

pub(super) async fn robot_status_handler(State(state): State<AppState>) -> Json<RobotStatus> {
    Json(state.status().snapshot())
}
