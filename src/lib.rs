// DataMind - conversational CSV dashboards backed by a generative analysis engine

pub mod analysis;
pub mod charts;
pub mod config;
pub mod conversation;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod routes;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use analysis::AnalysisEngine;
pub use config::Config;
pub use models::AppState;
pub use session::Session;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
