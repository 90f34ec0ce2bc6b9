//! REST API module.
//!
//! Every response carries the backend that served it, so the client can show whether it
//! is working against the shared database or the local fallback.

mod connection;
mod logs;
mod quizzes;
mod settings;
mod users;

pub use connection::*;
pub use logs::*;
pub use quizzes::*;
pub use settings::*;
pub use users::*;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithBackend};
use crate::models::{BackendStatus, User};
use crate::AppState;

/// Header naming the account a request acts as.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub backend: BackendStatus,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, backend: BackendStatus) -> Self {
        Self {
            success: true,
            data,
            backend,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithBackend>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, backend: BackendStatus) -> ApiResult<T> {
    Ok(ApiResponse::new(data, backend))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, backend: BackendStatus) -> ApiResult<T> {
    Err(AppErrorWithBackend {
        error: err,
        backend,
    })
}

/// The account named by the `x-user-id` header, loaded from the active backend.
pub struct Actor(pub User);

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppErrorWithBackend;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let backend = state.repo.status();
        let reject = |message: &str| AppErrorWithBackend {
            error: AppError::Unauthorized(message.to_string()),
            backend,
        };

        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| reject("Missing x-user-id header"))?;

        match state.repo.get_user(id).await {
            Some(user) => Ok(Actor(user)),
            None => Err(reject("Unknown user")),
        }
    }
}
