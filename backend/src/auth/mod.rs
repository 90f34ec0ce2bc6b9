//! API key guard and account authorization rules.
//!
//! Secrets are compared in constant time to mitigate timing attacks.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::connection::ConnectionManager;
use crate::errors::{AppError, AppErrorWithBackend};
use crate::models::{Quiz, User};
use crate::provision::SEED_ADMIN_ID;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    connection: Arc<ConnectionManager>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key", &connection)
            }
        }
        None => {
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key", &connection),
            }
        }
    }
}

/// Perform constant-time string comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str, connection: &ConnectionManager) -> Response {
    AppErrorWithBackend {
        error: AppError::Unauthorized(message.to_string()),
        backend: connection.current_status(),
    }
    .into_response()
}

// ==================== ACCOUNT POLICY ====================

/// Deactivated accounts may not change anything.
pub fn require_active(actor: &User) -> Result<(), AppError> {
    if actor.is_active {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Account {} is deactivated",
            actor.username
        )))
    }
}

pub fn require_admin(actor: &User) -> Result<(), AppError> {
    require_active(actor)?;
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Administrator privileges required".to_string(),
        ))
    }
}

/// The bootstrap administrator can never be removed or locked out.
pub fn ensure_not_protected(user_id: &str) -> Result<(), AppError> {
    if user_id == SEED_ADMIN_ID {
        Err(AppError::Forbidden(
            "The primary administrator account is protected".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Admins set any balance; a teacher may only spend down their own.
pub fn authorize_credit_change(actor: &User, target: &User, credits: u32) -> Result<(), AppError> {
    require_active(actor)?;
    if actor.is_admin() {
        return Ok(());
    }
    if actor.id == target.id && credits <= target.credits {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Teachers may only spend their own credits".to_string(),
    ))
}

/// Admins manage every quiz; teachers manage the ones they created.
pub fn authorize_quiz_owner(actor: &User, quiz: &Quiz) -> Result<(), AppError> {
    require_active(actor)?;
    if actor.is_admin() || quiz.created_by == actor.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Quiz {} belongs to another account",
            quiz.id
        )))
    }
}
