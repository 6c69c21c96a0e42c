//! The HTTP front door: health check and code upload.
//!
//! Grounded on `server/router.go` + `server/handler/judge.go`'s two-route
//! Gin router, rebuilt as an `axum::Router`, and on the teacher's
//! `admin_router`/`Router::new().route(...).with_state(...)` construction
//! idiom. `spec.md` treats this as an excluded external collaborator, but
//! the original ships it in the same binary and it is cheap to include —
//! see `SPEC_FULL.md` §4.E.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;

use judgecore_store::ProblemStore;

pub struct HttpState {
    pub code_dir: PathBuf,
    pub store: Arc<dyn ProblemStore>,
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/v1/judgecore/health", get(health))
        .route("/api/v1/judgecore/judge", post(judge))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn judge(
    State(state): State<Arc<HttpState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let field = match multipart.next_field().await {
        Ok(Some(field)) if field.name() == Some("code") => field,
        Ok(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to get form file"})),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "error reading multipart body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to get form file"})),
            );
        }
    };

    let filename = match field.file_name() {
        Some(name) => name.to_string(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to get form file"})),
            )
        }
    };

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "error reading uploaded file body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to save file"})),
            );
        }
    };

    let save_path = state.code_dir.join(&filename);
    if let Err(e) = tokio::fs::write(&save_path, &bytes).await {
        tracing::warn!(error = %e, path = %save_path.display(), "error saving uploaded file");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Failed to save file"})),
        );
    }

    if let Some(task) = judgecore_core::SubmissionTask::parse(&filename).ok() {
        if let Err(e) = state.store.mark_running(task.user_id, task.problem_id).await {
            tracing::warn!(error = %e, "failed to mark submission running");
        }
    }

    (StatusCode::OK, Json(json!({"message": "File received"})))
}
