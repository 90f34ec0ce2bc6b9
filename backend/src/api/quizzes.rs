//! Quiz API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, Actor, ApiResult};
use crate::models::{LogType, Quiz, QuizQuery, SaveQuizRequest, UpdateVisibilityRequest};
use crate::AppState;

/// GET /api/quizzes - List quizzes, newest first.
///
/// Admins may list everything or filter by `owner`; everyone else sees their own.
pub async fn list_quizzes(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<QuizQuery>,
) -> ApiResult<Vec<Quiz>> {
    let backend = state.repo.status();

    let owner = if actor.is_admin() {
        query.owner.filter(|o| !o.trim().is_empty())
    } else {
        Some(actor.id.clone())
    };

    success(state.repo.get_quizzes(owner.as_deref()).await, backend)
}

/// POST /api/quizzes - Save a generated quiz.
pub async fn save_quiz(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<SaveQuizRequest>,
) -> ApiResult<Quiz> {
    let backend = state.repo.status();
    let quiz = request.into_quiz(&actor.id);

    match state.repo.save_quiz(&actor, quiz).await {
        Ok(quiz) => {
            state
                .repo
                .add_log(
                    "SAVE_QUIZ",
                    &format!(
                        "Saved quiz {} ({} questions)",
                        quiz.id,
                        quiz.payload.questions.len()
                    ),
                    LogType::Success,
                    &actor.username,
                )
                .await;
            success(quiz, backend)
        }
        Err(e) => error(e, backend),
    }
}

/// DELETE /api/quizzes/:id - Delete a quiz.
pub async fn delete_quiz(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state.repo.delete_quiz(&actor, &id).await {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}

/// PUT /api/quizzes/:id/visibility - Publish or hide a quiz.
pub async fn toggle_quiz_visibility(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateVisibilityRequest>,
) -> ApiResult<()> {
    let backend = state.repo.status();

    match state
        .repo
        .toggle_quiz_visibility(&actor, &id, request.is_public)
        .await
    {
        Ok(()) => success((), backend),
        Err(e) => error(e, backend),
    }
}
