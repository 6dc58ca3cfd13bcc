//! Session state
//!
//! A [`Session`] owns everything one user works with: the loaded dataset,
//! the dashboard, the chat log with its busy flag, and the id sequence.
//!
//! Engine calls are split into a synchronous `begin_*` step, the awaited
//! engine call, and a synchronous `finish_*`/`complete_*` step. Callers that
//! share a session behind a lock (the HTTP API) hold it only for the two
//! synchronous steps; the busy flag keeps a second call out in between.
//! [`Session::load`] and [`Session::submit_user_message`] run all three steps
//! for callers that own the session outright.

pub mod registry;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisEngine, AnalysisOutcome, ChatReply};
use crate::charts::{
    is_hex_color, registry as charts, ChartConfig, ChartDraft, ChartType, DashboardAnalysis,
};
use crate::conversation::{announcement, ChatMessage, ChatRole, Conversation, WELCOME_MESSAGE};
use crate::ingest::{self, synthetic, Dataset, IngestOptions};
use crate::types::{AppError, AppResult};

pub use registry::{SessionHandle, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upload,
    Dashboard,
}

/// A dataset ingested by [`Session::begin_upload`], waiting for its analysis.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub dataset: Arc<Dataset>,
}

/// A user message accepted by [`Session::begin_turn`].
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub dataset: Arc<Dataset>,
    /// Log before the accepted message.
    pub history: Vec<ChatMessage>,
    pub message: String,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    options: IngestOptions,
    phase: Phase,
    dataset: Option<Arc<Dataset>>,
    analysis: Option<DashboardAnalysis>,
    conversation: Conversation,
    warnings: Vec<String>,
    sequence: u64,
}

impl Session {
    pub fn new(options: IngestOptions) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            options,
            phase: Phase::Upload,
            dataset: None,
            analysis: None,
            conversation: Conversation::new(),
            warnings: Vec::new(),
            sequence: 0,
        };
        session.seed_log();
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn analysis(&self) -> Option<&DashboardAnalysis> {
        self.analysis.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.is_busy()
    }

    /// Ingestion and validation warnings for the current dataset.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}-{}", prefix, self.sequence)
    }

    fn seed_log(&mut self) {
        self.conversation = Conversation::new();
        let id = self.next_id("msg");
        self.conversation
            .push(ChatMessage::new(id, ChatRole::Model, WELCOME_MESSAGE));
    }

    // ---- dataset loading ----

    /// Ingest `raw` and mark the session busy. Only allowed in the upload
    /// phase; a loaded dashboard must be [`reset`](Session::reset) first.
    /// On an ingestion failure nothing changes.
    pub fn begin_upload(&mut self, raw: &str) -> AppResult<PendingUpload> {
        if self.is_busy() {
            return Err(AppError::Busy(
                "an analysis or chat request is in progress".to_string(),
            ));
        }
        if self.phase != Phase::Upload {
            return Err(AppError::InvalidRequest(
                "a dataset is already loaded; reset the session first".to_string(),
            ));
        }
        let dataset = ingest::ingest(raw, &self.options)?;
        self.conversation.acquire()?;
        info!(
            session = %self.id,
            rows = dataset.len(),
            columns = dataset.columns().len(),
            "Dataset ingested, awaiting analysis"
        );
        Ok(PendingUpload {
            dataset: Arc::new(dataset),
        })
    }

    /// Commit the dataset and its analysis together, or on failure leave the
    /// session as it was before [`Session::begin_upload`].
    pub fn finish_upload(
        &mut self,
        pending: PendingUpload,
        result: AppResult<AnalysisOutcome>,
    ) -> AppResult<&DashboardAnalysis> {
        self.conversation.release();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Analysis failed, session unchanged");
                return Err(e);
            }
        };

        let mut warnings: Vec<String> = pending
            .dataset
            .duplicate_columns()
            .iter()
            .map(|c| format!("duplicate column \"{}\": the last value in each row is kept", c))
            .collect();
        warnings.extend(outcome.warnings);

        let mut analysis = outcome.analysis;
        for chart in &mut analysis.charts {
            chart.id = self.next_id("chart");
        }

        let message_id = self.next_id("msg");
        self.conversation.push(ChatMessage::new(
            message_id,
            ChatRole::Model,
            announcement(&analysis.dataset_title),
        ));

        info!(
            session = %self.id,
            title = %analysis.dataset_title,
            charts = analysis.charts.len(),
            warnings = warnings.len(),
            "Dashboard ready"
        );

        self.dataset = Some(pending.dataset);
        self.warnings = warnings;
        self.phase = Phase::Dashboard;
        Ok(&*self.analysis.insert(analysis))
    }

    pub async fn load(&mut self, engine: &AnalysisEngine, raw: &str) -> AppResult<&DashboardAnalysis> {
        let pending = self.begin_upload(raw)?;
        let result = engine.request_initial_analysis(&pending.dataset).await;
        self.finish_upload(pending, result)
    }

    /// Load the synthetic monthly business dataset.
    pub async fn load_sample<R: Rng>(
        &mut self,
        engine: &AnalysisEngine,
        rng: &mut R,
    ) -> AppResult<&DashboardAnalysis> {
        let raw = synthetic::monthly_business_csv(rng);
        self.load(engine, &raw).await
    }

    // ---- chat ----

    pub fn begin_turn(&mut self, text: &str) -> AppResult<ChatTurn> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidRequest("message is empty".to_string()));
        }
        let dataset = self
            .dataset
            .clone()
            .ok_or_else(|| AppError::InvalidRequest("no dataset loaded".to_string()))?;
        if self.is_busy() {
            return Err(AppError::Busy(
                "the previous message is still being answered".to_string(),
            ));
        }

        let history = self.conversation.messages().to_vec();
        let id = self.next_id("msg");
        self.conversation
            .accept(ChatMessage::new(id, ChatRole::User, text))?;

        Ok(ChatTurn {
            dataset,
            history,
            message: text.to_string(),
        })
    }

    /// Append the model's reply, prepend its chart to the dashboard and
    /// clear the busy flag.
    pub fn complete_turn(&mut self, reply: ChatReply) -> ChatMessage {
        let chart = reply.chart.map(|mut chart| {
            chart.id = self.next_id("chart");
            chart
        });

        if let Some(chart) = &chart {
            self.analysis = self
                .analysis
                .as_ref()
                .map(|analysis| charts::prepend(analysis, chart.clone()));
        }

        let id = self.next_id("msg");
        let message = ChatMessage::new(id, ChatRole::Model, reply.text).with_chart(chart);
        self.conversation.complete(message.clone());
        message
    }

    pub async fn submit_user_message(
        &mut self,
        engine: &AnalysisEngine,
        text: &str,
    ) -> AppResult<ChatMessage> {
        let turn = self.begin_turn(text)?;
        let reply = engine
            .request_chat_turn(&turn.history, &turn.message, &turn.dataset)
            .await;
        Ok(self.complete_turn(reply))
    }

    // ---- chart editing ----

    fn dashboard(&self) -> AppResult<&DashboardAnalysis> {
        self.analysis
            .as_ref()
            .ok_or_else(|| AppError::InvalidRequest("no dashboard loaded".to_string()))
    }

    pub fn add_chart(&mut self, draft: ChartDraft) -> AppResult<ChartConfig> {
        self.dashboard()?;
        check_color(draft.color.as_deref().filter(|c| !c.trim().is_empty()))?;
        let columns = self
            .dataset
            .as_ref()
            .map(|d| d.columns().to_vec())
            .unwrap_or_default();
        let config = draft.into_config(self.next_id("chart"), &columns);
        let analysis = charts::append(self.dashboard()?, config.clone());
        self.analysis = Some(analysis);
        Ok(config)
    }

    /// Replace the chart at `index`. The replacement keeps the slot's id.
    /// Returns `false` (and changes nothing) when `index` is out of range.
    pub fn replace_chart(&mut self, index: usize, config: ChartConfig) -> AppResult<bool> {
        check_color(config.color.as_deref())?;
        let analysis = self.dashboard()?;
        let Some(current) = analysis.charts.get(index) else {
            return Ok(false);
        };
        let config = ChartConfig {
            id: current.id.clone(),
            ..config
        };
        self.analysis = Some(charts::replace_at(analysis, index, config));
        Ok(true)
    }

    pub fn change_chart_type(&mut self, index: usize, chart_type: ChartType) -> AppResult<bool> {
        let analysis = self.dashboard()?;
        if index >= analysis.charts.len() {
            return Ok(false);
        }
        self.analysis = Some(charts::retype(analysis, index, chart_type));
        Ok(true)
    }

    // ---- reset ----

    /// Back to the upload phase with a fresh log.
    pub fn reset(&mut self) -> AppResult<()> {
        if self.is_busy() {
            return Err(AppError::Busy(
                "cannot reset while a request is in progress".to_string(),
            ));
        }
        self.phase = Phase::Upload;
        self.dataset = None;
        self.analysis = None;
        self.warnings.clear();
        self.seed_log();
        info!(session = %self.id, "Session reset");
        Ok(())
    }
}

fn check_color(color: Option<&str>) -> AppResult<()> {
    match color {
        Some(color) if !is_hex_color(color) => Err(AppError::InvalidRequest(format!(
            "color \"{}\" is not a hex color",
            color
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{prompts::FALLBACK_REPLY, AnalysisSettings};
    use crate::llm::ScriptedAdapter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CSV: &str = "Month,Revenue\nJan,100\nFeb,120";

    const ANALYSIS: &str = r#"{
        "datasetTitle": "Sales",
        "summary": "Two months of revenue",
        "charts": [
            {"id": "x", "title": "Revenue", "type": "bar", "xAxisKey": "Month", "yAxisKey": "Revenue"},
            {"id": "x", "title": "Trend", "type": "line", "xAxisKey": "Month", "yAxisKey": "Revenue"}
        ]
    }"#;

    fn engine(adapter: ScriptedAdapter) -> AnalysisEngine {
        AnalysisEngine::new(Arc::new(adapter), AnalysisSettings::default())
    }

    fn chart(title: &str) -> ChartConfig {
        ChartConfig {
            id: "ignored".to_string(),
            title: title.to_string(),
            description: String::new(),
            chart_type: ChartType::Pie,
            x_axis_key: "Month".to_string(),
            y_axis_key: "Revenue".to_string(),
            series_key: None,
            color: None,
        }
    }

    async fn loaded(extra: ScriptedAdapter) -> (Session, AnalysisEngine) {
        let engine = engine(extra);
        let mut session = Session::new(IngestOptions::default());
        session.load(&engine, CSV).await.unwrap();
        (session, engine)
    }

    #[test]
    fn test_new_session_has_welcome() {
        let session = Session::new(IngestOptions::default());
        assert_eq!(session.phase(), Phase::Upload);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, WELCOME_MESSAGE);
        assert_eq!(session.messages()[0].role, ChatRole::Model);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_load_commits_dashboard_and_restamps_ids() {
        let (session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;

        assert_eq!(session.phase(), Phase::Dashboard);
        assert!(!session.is_busy());
        let analysis = session.analysis().unwrap();
        let ids: Vec<&str> = analysis.charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chart-2", "chart-3"]);
        assert_eq!(session.dataset().unwrap().len(), 2);

        let last = session.messages().last().unwrap();
        assert!(last.content.contains("\"Sales\""));
    }

    #[tokio::test]
    async fn test_ingestion_failure_changes_nothing() {
        let engine = engine(ScriptedAdapter::new().reply(ANALYSIS));
        let mut session = Session::new(IngestOptions::default());
        let err = session.load(&engine, "Month,Revenue").await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
        assert_eq!(session.phase(), Phase::Upload);
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_charts_leaves_session_untouched() {
        let bad = engine(ScriptedAdapter::new().reply(r#"{"datasetTitle": "X", "summary": "Y"}"#));
        let mut session = Session::new(IngestOptions::default());
        let before = session.messages().to_vec();

        let err = session.load(&bad, CSV).await.unwrap_err();

        assert!(matches!(err, AppError::Analysis(_)));
        assert_eq!(session.phase(), Phase::Upload);
        assert!(session.analysis().is_none());
        assert!(session.dataset().is_none());
        assert_eq!(session.messages(), before.as_slice());
        assert!(!session.is_busy());

        // the same session can still load once the engine behaves
        let good = engine(ScriptedAdapter::new().reply(ANALYSIS));
        session.load(&good, CSV).await.unwrap();
        assert_eq!(session.phase(), Phase::Dashboard);
    }

    #[tokio::test]
    async fn test_upload_requires_reset_once_loaded() {
        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;
        let before_analysis = session.analysis().cloned();
        let before_messages = session.messages().len();

        let err = session.begin_upload("A,B\n1,2").unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(session.analysis().cloned(), before_analysis);
        assert_eq!(session.messages().len(), before_messages);
        assert!(!session.is_busy());

        session.reset().unwrap();
        let pending = session.begin_upload("A,B\n1,2").unwrap();
        assert_eq!(pending.dataset.columns(), ["A", "B"]);
        assert!(session.is_busy());
    }

    #[tokio::test]
    async fn test_chart_colors_must_be_hex() {
        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;

        let draft = ChartDraft {
            color: Some("blue".to_string()),
            ..ChartDraft::default()
        };
        assert!(matches!(session.add_chart(draft), Err(AppError::InvalidRequest(_))));
        assert_eq!(session.analysis().unwrap().charts.len(), 2);

        let blank = ChartDraft {
            color: Some(" ".to_string()),
            ..ChartDraft::default()
        };
        assert_eq!(session.add_chart(blank).unwrap().color.as_deref(), Some("#3b82f6"));

        let bad = ChartConfig {
            color: Some("red".to_string()),
            ..chart("Red")
        };
        assert!(matches!(session.replace_chart(0, bad), Err(AppError::InvalidRequest(_))));
        assert_eq!(session.analysis().unwrap().charts[0].title, "Revenue");
    }

    #[tokio::test]
    async fn test_submission_while_busy_is_rejected() {
        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;
        let count = session.messages().len();

        let turn = session.begin_turn("what is the trend?").unwrap();
        assert!(session.is_busy());
        assert_eq!(session.messages().len(), count + 1);

        let err = session.begin_turn("again").unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
        assert_eq!(session.messages().len(), count + 1);

        assert_eq!(turn.history.len(), count);
        session.complete_turn(ChatReply::fallback());
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), count + 2);
    }

    #[tokio::test]
    async fn test_chat_chart_is_prepended() {
        let (mut session, engine) = loaded(
            ScriptedAdapter::new().reply(ANALYSIS).reply(
                r#"{"textResponse": "Here", "newChart": {"id": "c1", "title": "Pie", "type": "pie", "xAxisKey": "Month", "yAxisKey": "Revenue"}}"#,
            ),
        )
        .await;

        let message = session.submit_user_message(&engine, "show a pie").await.unwrap();
        let related = message.related_chart.clone().unwrap();
        assert_eq!(message.role, ChatRole::Model);

        let charts = &session.analysis().unwrap().charts;
        assert_eq!(charts.len(), 3);
        assert_eq!(charts[0], related);
        assert_eq!(charts[0].title, "Pie");
        assert_ne!(charts[0].id, "c1");
    }

    #[tokio::test]
    async fn test_failed_turn_uses_fallback() {
        let (mut session, engine) = loaded(ScriptedAdapter::new().reply(ANALYSIS).fail("down")).await;
        let message = session.submit_user_message(&engine, "hello").await.unwrap();
        assert_eq!(message.content, FALLBACK_REPLY);
        assert!(message.related_chart.is_none());
        assert_eq!(session.analysis().unwrap().charts.len(), 2);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_blank_message_and_no_dataset() {
        let mut session = Session::new(IngestOptions::default());
        assert!(matches!(session.begin_turn("hi"), Err(AppError::InvalidRequest(_))));

        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;
        assert!(matches!(session.begin_turn("   "), Err(AppError::InvalidRequest(_))));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_chart_editing() {
        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;

        let added = session.add_chart(ChartDraft::default()).unwrap();
        assert_eq!(added.title, "New Chart");
        assert_eq!(added.x_axis_key, "Month");
        assert_eq!(added.y_axis_key, "Revenue");
        assert_eq!(session.analysis().unwrap().charts.last(), Some(&added));

        assert!(session.replace_chart(0, chart("Replaced")).unwrap());
        let first = &session.analysis().unwrap().charts[0];
        assert_eq!(first.title, "Replaced");
        assert_eq!(first.id, "chart-2");

        assert!(!session.replace_chart(99, chart("Nope")).unwrap());
        assert_eq!(session.analysis().unwrap().charts.len(), 3);

        assert!(session.change_chart_type(1, ChartType::Scatter).unwrap());
        assert_eq!(session.analysis().unwrap().charts[1].chart_type, ChartType::Scatter);
        assert!(!session.change_chart_type(7, ChartType::Bar).unwrap());
    }

    #[test]
    fn test_chart_editing_requires_dashboard() {
        let mut session = Session::new(IngestOptions::default());
        assert!(session.add_chart(ChartDraft::default()).is_err());
        assert!(session.change_chart_type(0, ChartType::Bar).is_err());
    }

    #[tokio::test]
    async fn test_reset() {
        let (mut session, _) = loaded(ScriptedAdapter::new().reply(ANALYSIS)).await;
        session.begin_turn("pending").unwrap();
        assert!(matches!(session.reset(), Err(AppError::Busy(_))));
        session.complete_turn(ChatReply::fallback());

        session.reset().unwrap();
        assert_eq!(session.phase(), Phase::Upload);
        assert!(session.analysis().is_none());
        assert!(session.dataset().is_none());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_load_sample() {
        let engine = engine(ScriptedAdapter::new().reply(ANALYSIS));
        let mut session = Session::new(IngestOptions::default());
        let mut rng = StdRng::seed_from_u64(7);
        session.load_sample(&engine, &mut rng).await.unwrap();

        let dataset = session.dataset().unwrap();
        assert_eq!(dataset.len(), 12);
        assert_eq!(dataset.columns()[0], "Month");
        // the scripted charts only bind Month and Revenue
        assert!(session.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_headers_surface_as_warnings() {
        let engine = engine(ScriptedAdapter::new().reply(ANALYSIS));
        let mut session = Session::new(IngestOptions::default());
        session
            .load(&engine, "Month,Revenue,Revenue\nJan,1,2")
            .await
            .unwrap();
        assert_eq!(session.warnings().len(), 1);
        assert!(session.warnings()[0].contains("Revenue"));
    }
}
