//! HTTP presentation shell over the session controller.
//!
//! Thin by intent: every handler forwards to a controller operation and
//! maps its result to JSON. A browser timer UI polls `/state`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::clock::format_elapsed;
use crate::error::{ControllerError, RemoteError};
use crate::models::{ApiResponse, DraftPatch, SessionState, StopRequest};
use crate::remote::SessionRemote;
use crate::SessionController;

type Shared<R> = Arc<SessionController<R>>;

pub fn router<R: SessionRemote + 'static>(controller: Shared<R>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/state", get(get_state::<R>))
        .route("/draft", post(update_draft::<R>))
        .route("/sessions/start", post(start_session::<R>))
        .route("/sessions/stop", post(stop_session::<R>))
        .route("/sessions/reset", post(reset_session::<R>))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

#[derive(Debug, Serialize)]
struct StateView {
    state: SessionState,
    elapsed: String,
}

impl From<SessionState> for StateView {
    fn from(state: SessionState) -> Self {
        let elapsed = format_elapsed(state.clock_seconds());
        Self { state, elapsed }
    }
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let (status, data) = match &self {
            ControllerError::Validation { missing } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "missing": missing }),
            ),
            ControllerError::InvalidState { operation, status } => (
                StatusCode::CONFLICT,
                serde_json::json!({ "operation": operation, "state": status }),
            ),
            ControllerError::StartFailed(remote) | ControllerError::StopFailed(remote) => {
                (StatusCode::BAD_GATEWAY, remote_detail(remote))
            }
        };
        let body = ApiResponse::error(self.to_string()).with_data(data);
        (status, Json(body)).into_response()
    }
}

fn remote_detail(err: &RemoteError) -> serde_json::Value {
    match err {
        RemoteError::Status { status, body, .. } => {
            serde_json::json!({ "remote_status": status, "remote_body": body })
        }
        RemoteError::Timeout { .. } => serde_json::json!({ "timeout": true }),
        RemoteError::Transport { .. } => serde_json::json!({ "transport": true }),
    }
}

async fn root() -> &'static str {
    "Project-A session tracker"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn get_state<R: SessionRemote + 'static>(State(ctrl): State<Shared<R>>) -> Json<StateView> {
    Json(ctrl.current_state().into())
}

async fn update_draft<R: SessionRemote + 'static>(
    State(ctrl): State<Shared<R>>,
    Json(patch): Json<DraftPatch>,
) -> Response {
    if ctrl.update_draft(patch) {
        Json(StateView::from(ctrl.current_state())).into_response()
    } else {
        let message = format!("draft is locked while {}", ctrl.status());
        (StatusCode::CONFLICT, Json(ApiResponse::error(message))).into_response()
    }
}

async fn start_session<R: SessionRemote + 'static>(State(ctrl): State<Shared<R>>) -> Response {
    let task = tokio::spawn(async move { ctrl.request_start().await });
    match task.await {
        Ok(Ok(session)) => Json(session).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join_err) => internal_error(join_err),
    }
}

async fn stop_session<R: SessionRemote + 'static>(
    State(ctrl): State<Shared<R>>,
    request: Option<Json<StopRequest>>,
) -> Response {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let task = tokio::spawn(async move { ctrl.request_stop(request).await });
    match task.await {
        Ok(Ok(stopped)) => Json(stopped).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join_err) => internal_error(join_err),
    }
}

async fn reset_session<R: SessionRemote + 'static>(State(ctrl): State<Shared<R>>) -> Response {
    match ctrl.reset_local() {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.into_response(),
    }
}

fn internal_error(err: tokio::task::JoinError) -> Response {
    tracing::error!(error = %err, "session transition task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("session transition task failed")),
    )
        .into_response()
}
