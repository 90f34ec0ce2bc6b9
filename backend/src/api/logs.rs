//! Activity log endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, Actor, ApiResult};
use crate::auth::{require_active, require_admin};
use crate::errors::AppError;
use crate::models::{CreateLogRequest, LogEntry};
use crate::AppState;

/// GET /api/logs - Most recent entries first.
pub async fn list_logs(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Vec<LogEntry>> {
    let backend = state.repo.status();
    if let Err(e) = require_admin(&actor) {
        return error(e, backend);
    }
    success(state.repo.get_logs().await, backend)
}

/// POST /api/logs - Record an activity on behalf of the caller.
pub async fn create_log(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateLogRequest>,
) -> ApiResult<()> {
    let backend = state.repo.status();
    if let Err(e) = require_active(&actor) {
        return error(e, backend);
    }
    if request.action.trim().is_empty() {
        return error(
            AppError::Validation("Action is required".to_string()),
            backend,
        );
    }

    state
        .repo
        .add_log(
            request.action.trim(),
            &request.details,
            request.log_type,
            &actor.username,
        )
        .await;
    success((), backend)
}

/// DELETE /api/logs - Clear the activity log.
pub async fn clear_logs(State(state): State<AppState>, Actor(actor): Actor) -> ApiResult<()> {
    let backend = state.repo.status();

    match state.repo.clear_logs(&actor).await {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}

/// DELETE /api/logs/:id - Delete one entry.
pub async fn delete_log(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state.repo.delete_log(&actor, &id).await {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}
