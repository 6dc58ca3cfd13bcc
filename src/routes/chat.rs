use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/messages", post(post_message))
        .with_state(state)
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let handle = state.sessions.get(id).await?;
    let turn = handle.write().await.begin_turn(&request.message)?;
    info!(session = %id, message_len = turn.message.len(), "Chat message accepted");

    // Detached so the turn completes and clears busy even if the client goes away.
    let engine = state.engine.clone();
    let task = tokio::spawn(async move {
        let reply = engine
            .request_chat_turn(&turn.history, &turn.message, &turn.dataset)
            .await;
        let warnings = reply.warnings.clone();

        let mut session = handle.write().await;
        let message = session.complete_turn(reply);
        ChatResponse {
            message,
            analysis: session.analysis().cloned(),
            warnings,
        }
    });

    task.await
        .map(Json)
        .map_err(|e| AppError::Internal(format!("chat turn task failed: {}", e)))
}
