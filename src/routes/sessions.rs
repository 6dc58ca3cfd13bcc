use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::ingest::synthetic;
use crate::models::{AppState, RowsResponse, SessionSnapshot};
use crate::session::SessionHandle;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/dataset", post(upload_dataset))
        .route("/api/sessions/{id}/sample", post(load_sample))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/rows", get(get_rows))
        .with_state(state)
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let (id, handle) = state.sessions.create().await;
    info!(session = %id, "Session created");
    let session = handle.read().await;
    (StatusCode::CREATED, Json(SessionSnapshot::from(&*session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let handle = state.sessions.get(id).await?;
    let session = handle.read().await;
    Ok(Json(SessionSnapshot::from(&*session)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.remove(id).await?;
    info!(session = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Ingest and analyse `raw`. The session lock is released while the engine
/// works; the busy flag keeps other engine calls out meanwhile.
///
/// The engine call and `finish_upload` run on their own task, so dropping
/// the request future cannot strand the session in the busy state.
async fn analyse(state: &AppState, handle: SessionHandle, raw: &str) -> AppResult<SessionSnapshot> {
    let pending = handle.write().await.begin_upload(raw)?;
    let engine = state.engine.clone();

    let task = tokio::spawn(async move {
        let result = engine.request_initial_analysis(&pending.dataset).await;
        let mut session = handle.write().await;
        session.finish_upload(pending, result)?;
        Ok::<_, AppError>(SessionSnapshot::from(&*session))
    });

    task.await
        .map_err(|e| AppError::Internal(format!("analysis task failed: {}", e)))?
}

async fn upload_dataset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: String,
) -> AppResult<Json<SessionSnapshot>> {
    let handle = state.sessions.get(id).await?;
    info!(session = %id, bytes = body.len(), "Dataset upload received");
    analyse(&state, handle, &body).await.map(Json)
}

async fn load_sample(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let handle = state.sessions.get(id).await?;
    let raw = synthetic::monthly_business_csv(&mut rand::thread_rng());
    info!(session = %id, "Loading sample dataset");
    analyse(&state, handle, &raw).await.map(Json)
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.write().await;
    session.reset()?;
    Ok(Json(SessionSnapshot::from(&*session)))
}

async fn get_rows(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RowsResponse>> {
    let handle = state.sessions.get(id).await?;
    let session = handle.read().await;
    let dataset = session
        .dataset()
        .ok_or_else(|| AppError::NotFound("no dataset loaded".to_string()))?;
    Ok(Json(RowsResponse {
        columns: dataset.columns().to_vec(),
        rows: dataset.rows().to_vec(),
    }))
}
