use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisEngine;
use crate::charts::{ChartConfig, ChartType, DashboardAnalysis};
use crate::config::Config;
use crate::conversation::ChatMessage;
use crate::ingest::Row;
use crate::session::{Phase, Session, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub engine: Arc<AnalysisEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<AnalysisEngine>) -> Self {
        let sessions = SessionRegistry::new(crate::ingest::IngestOptions {
            splitter: config.analysis.splitter,
        });
        Self {
            config,
            sessions,
            engine,
        }
    }
}

// API request/response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub provider: String,
    pub model: String,
}

/// Everything the UI needs to draw one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub phase: Phase,
    pub busy: bool,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub analysis: Option<DashboardAnalysis>,
    pub messages: Vec<ChatMessage>,
    pub warnings: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        let dataset = session.dataset();
        Self {
            id: session.id(),
            phase: session.phase(),
            busy: session.is_busy(),
            columns: dataset.map(|d| d.columns().to_vec()).unwrap_or_default(),
            row_count: dataset.map(|d| d.len()).unwrap_or(0),
            analysis: session.analysis().cloned(),
            messages: session.messages().to_vec(),
            warnings: session.warnings().to_vec(),
            created_at: session.created_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub analysis: Option<DashboardAnalysis>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetypeRequest {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub chart: ChartConfig,
    pub analysis: DashboardAnalysis,
}
