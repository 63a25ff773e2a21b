//! HTTP routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use reverie_domain::{ConversationId, ExecutionId};
use reverie_protocol::{
    FinalizeTurnResponse, ProgressResponse, SubmitTurnRequest, SubmitTurnResponse,
};

use crate::app::App;
use crate::use_cases::turn::TurnError;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/conversations/{id}/turns", post(submit_turn))
        .route("/api/turns/{id}/progress", get(turn_progress))
        .route("/api/turns/{id}/finalize", post(finalize_turn))
}

async fn health() -> &'static str {
    "OK"
}

async fn submit_turn(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitTurnRequest>,
) -> Result<Json<SubmitTurnResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let execution_id = app
        .turns
        .submit
        .execute(
            ConversationId::from_uuid(id),
            &request.message,
            request.generate_image,
        )
        .await?;

    Ok(Json(SubmitTurnResponse {
        execution_id: execution_id.to_uuid(),
    }))
}

async fn turn_progress(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let progress = app
        .turns
        .progress
        .execute(ExecutionId::from_uuid(id))
        .await?;

    Ok(Json(ProgressResponse {
        status: progress.status.as_str().to_string(),
        progress: progress.progress,
        current_step: progress.current_step,
    }))
}

async fn finalize_turn(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinalizeTurnResponse>, ApiError> {
    let finalized = app
        .turns
        .finalize
        .execute(ExecutionId::from_uuid(id))
        .await?;

    Ok(Json(FinalizeTurnResponse {
        message_id: finalized.message_id.to_uuid(),
        already_finalized: finalized.already_finalized,
    }))
}

pub enum ApiError {
    NotFound,
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound => {
                (axum::http::StatusCode::NOT_FOUND, "Not found").into_response()
            }
            ApiError::BadRequest(msg) => {
                (axum::http::StatusCode::BAD_REQUEST, msg).into_response()
            }
            ApiError::Conflict(msg) => {
                (axum::http::StatusCode::CONFLICT, msg).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                )
                    .into_response()
            }
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::ConversationNotFound | TurnError::ExecutionNotFound => ApiError::NotFound,
            TurnError::TurnAlreadyActive(_) | TurnError::NotCompleted => {
                ApiError::Conflict(e.to_string())
            }
            TurnError::Llm(_) | TurnError::Render(_) | TurnError::Repo(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
