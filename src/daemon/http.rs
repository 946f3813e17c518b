use crate::daemon::registry::{Refusal, SharedRegistry};
use crate::error::RemoteErrorCode;
use crate::model::{OperationResult, ProgramRuntimeView, ProgramSpec};
use crate::transport::http::{PROGRAMS_PATH, VERSION_PATH};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

/// HTTP routes served by the daemon
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route(VERSION_PATH, get(version))
        .route(PROGRAMS_PATH, get(list_programs).post(add_program))
        .with_state(registry)
}

async fn version() -> Json<OperationResult> {
    Json(OperationResult::new(crate::VERSION))
}

async fn list_programs(State(registry): State<SharedRegistry>) -> Json<Vec<ProgramRuntimeView>> {
    Json(registry.lock().await.list())
}

async fn add_program(
    State(registry): State<SharedRegistry>,
    Json(spec): Json<ProgramSpec>,
) -> Result<Json<OperationResult>, (StatusCode, String)> {
    registry
        .lock()
        .await
        .add(spec)
        .map(Json)
        .map_err(refusal_response)
}

fn refusal_response(refusal: Refusal) -> (StatusCode, String) {
    let status = match refusal.code {
        RemoteErrorCode::NotFound => StatusCode::NOT_FOUND,
        RemoteErrorCode::Invalid => StatusCode::BAD_REQUEST,
        RemoteErrorCode::Conflict => StatusCode::CONFLICT,
        RemoteErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, refusal.message)
}
