use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::charts::{ChartConfig, ChartDraft};
use crate::models::{AppState, ChartResponse, RetypeRequest};
use crate::session::Session;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/charts", post(add_chart))
        .route(
            "/api/sessions/{id}/charts/{index}",
            put(replace_chart).patch(retype_chart),
        )
        .with_state(state)
}

fn chart_response(session: &Session, index: usize) -> AppResult<ChartResponse> {
    let analysis = session
        .analysis()
        .cloned()
        .ok_or_else(|| AppError::Internal("dashboard vanished after edit".to_string()))?;
    let chart = analysis
        .charts
        .get(index)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("chart {}", index)))?;
    Ok(ChartResponse { chart, analysis })
}

async fn add_chart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ChartDraft>,
) -> AppResult<(StatusCode, Json<ChartResponse>)> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.write().await;
    session.add_chart(draft)?;
    let last = session.analysis().map(|a| a.charts.len()).unwrap_or(0).saturating_sub(1);
    Ok((StatusCode::CREATED, Json(chart_response(&session, last)?)))
}

async fn replace_chart(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(config): Json<ChartConfig>,
) -> AppResult<Json<ChartResponse>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.write().await;
    if !session.replace_chart(index, config)? {
        return Err(AppError::NotFound(format!("chart {}", index)));
    }
    chart_response(&session, index).map(Json)
}

async fn retype_chart(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(request): Json<RetypeRequest>,
) -> AppResult<Json<ChartResponse>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.write().await;
    if !session.change_chart_type(index, request.chart_type)? {
        return Err(AppError::NotFound(format!("chart {}", index)));
    }
    chart_response(&session, index).map(Json)
}
