//! Login and account endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, Actor, ApiResult};
use crate::auth::require_admin;
use crate::errors::AppError;
use crate::models::{
    CreateUserRequest, LogType, LoginRequest, UpdateCreditsRequest, UpdateUserStatusRequest, User,
};
use crate::AppState;

/// POST /api/auth/login - Exchange credentials for the account profile.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<User> {
    let backend = state.repo.status();

    let Some(user) = state
        .repo
        .authenticate(request.username.trim(), &request.password)
        .await
    else {
        return error(
            AppError::Unauthorized("Invalid username or password".to_string()),
            backend,
        );
    };

    if !user.is_active {
        return error(
            AppError::Forbidden("This account has been deactivated".to_string()),
            backend,
        );
    }

    state
        .repo
        .add_log("LOGIN", "Signed in", LogType::Info, &user.username)
        .await;
    success(user, backend)
}

/// GET /api/users - List all accounts.
pub async fn list_users(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Vec<User>> {
    let backend = state.repo.status();
    if let Err(e) = require_admin(&actor) {
        return error(e, backend);
    }
    success(state.repo.get_all_users().await, backend)
}

/// POST /api/users - Create an account.
pub async fn create_user(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    let backend = state.repo.status();

    match state.repo.create_user(&actor, &request).await {
        Ok(user) => {
            state
                .repo
                .add_log(
                    "CREATE_USER",
                    &format!("Created {} account {}", user.role.as_str(), user.username),
                    LogType::Success,
                    &actor.username,
                )
                .await;
            success(user, backend)
        }
        Err(e) => error(e, backend),
    }
}

/// DELETE /api/users/:id - Delete an account.
pub async fn delete_user(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state.repo.delete_user(&actor, &id).await {
        Ok(()) => {
            state
                .repo
                .add_log(
                    "DELETE_USER",
                    &format!("Deleted account {}", id),
                    LogType::Warning,
                    &actor.username,
                )
                .await;
            success((), backend)
        }
        Err(e) => error(e, backend),
    }
}

/// PUT /api/users/:id/credits - Set an account's credit balance.
pub async fn update_user_credits(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateCreditsRequest>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state
        .repo
        .update_user_credits(&actor, &id, request.credits)
        .await
    {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}

/// PUT /api/users/:id/active - Activate or deactivate an account.
pub async fn toggle_user_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserStatusRequest>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state
        .repo
        .toggle_user_status(&actor, &id, request.is_active)
        .await
    {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}
