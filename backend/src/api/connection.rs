//! Remote connection endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{error, success, Actor, ApiResult};
use crate::auth::require_admin;
use crate::connection::ConnectionPhase;
use crate::errors::AppError;
use crate::models::{BackendStatus, LogType, RemoteConfig};
use crate::AppState;

/// Connection state as reported to clients. The stored token is masked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub status: BackendStatus,
    pub phase: ConnectionPhase,
    pub stored_config: Option<RemoteConfig>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestResult {
    pub reachable: bool,
}

async fn connection_info(state: &AppState) -> ConnectionInfo {
    let (status, phase) = state.connection.snapshot();
    ConnectionInfo {
        status,
        phase,
        stored_config: state
            .connection
            .stored_config()
            .await
            .map(|c| c.redacted()),
    }
}

/// GET /api/connection - Active backend and stored credentials.
pub async fn get_connection(State(state): State<AppState>) -> ApiResult<ConnectionInfo> {
    let info = connection_info(&state).await;
    let backend = info.status;
    success(info, backend)
}

/// PUT /api/connection - Store new credentials and reconnect.
pub async fn update_connection(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(config): Json<RemoteConfig>,
) -> ApiResult<ConnectionInfo> {
    let backend = state.connection.current_status();
    if let Err(e) = require_admin(&actor) {
        return error(e, backend);
    }
    if !config.is_usable() {
        return error(
            AppError::Validation("Endpoint and auth token are both required".to_string()),
            backend,
        );
    }

    let connected = state
        .connection
        .set_remote_config(&config.endpoint, &config.auth_token)
        .await;
    let (log_type, details) = if connected {
        (LogType::Success, "Connected to remote database")
    } else {
        (LogType::Error, "Remote database unreachable; using local storage")
    };
    state
        .repo
        .add_log("UPDATE_CONNECTION", details, log_type, &actor.username)
        .await;

    let info = connection_info(&state).await;
    let backend = info.status;
    success(info, backend)
}

/// DELETE /api/connection - Forget stored credentials and reconnect.
pub async fn clear_connection(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<ConnectionInfo> {
    let backend = state.connection.current_status();
    if let Err(e) = require_admin(&actor) {
        return error(e, backend);
    }

    state.connection.clear_remote_config().await;

    let info = connection_info(&state).await;
    let backend = info.status;
    success(info, backend)
}

/// POST /api/connection/test - Probe credentials without switching backends.
pub async fn test_connection(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(config): Json<RemoteConfig>,
) -> ApiResult<ConnectionTestResult> {
    let backend = state.connection.current_status();
    if let Err(e) = require_admin(&actor) {
        return error(e, backend);
    }

    let reachable = state
        .connection
        .test_connection(&config.endpoint, &config.auth_token)
        .await;
    success(ConnectionTestResult { reachable }, backend)
}
