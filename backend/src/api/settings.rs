//! System settings endpoints.

use axum::{extract::State, Json};

use super::{error, success, Actor, ApiResult};
use crate::models::SystemSettings;
use crate::AppState;

/// GET /api/settings - Current settings, defaults filled in.
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<SystemSettings> {
    success(state.repo.get_settings().await, state.repo.status())
}

/// PUT /api/settings - Replace the settings record.
pub async fn save_settings(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(settings): Json<SystemSettings>,
) -> ApiResult<SystemSettings> {
    let backend = state.repo.status();

    match state.repo.save_settings(&actor, &settings).await {
        Ok(()) => success(settings, backend),
        Err(e) => error(e, backend),
    }
}
