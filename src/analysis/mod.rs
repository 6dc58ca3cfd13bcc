//! Analysis contract
//!
//! The two request kinds exchanged with the external analysis engine:
//! the one-shot dashboard analysis of a freshly loaded dataset, and the
//! conversational turn. Both send a prompt with a bounded row sample and a
//! response schema through an [`LLMAdapter`], then validate the reply in
//! [`schema`].
//!
//! The initial analysis is all-or-nothing. Chat turns never fail: any
//! problem degrades to [`prompts::FALLBACK_REPLY`] without a chart.

pub mod prompts;
pub mod schema;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::charts::{ChartConfig, DashboardAnalysis};
use crate::config::Config;
use crate::conversation::{ChatMessage, ChatRole};
use crate::ingest::{sample, Dataset};
use crate::llm::{LLMAdapter, LLM};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

/// Request parameters shared by every engine call.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub analysis_sample_rows: usize,
    pub chat_sample_rows: usize,
    /// Prior messages replayed as context for a chat turn; 0 disables.
    pub chat_history_turns: usize,
}

impl AnalysisSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            analysis_sample_rows: config.analysis.analysis_sample_rows,
            chat_sample_rows: config.analysis.chat_sample_rows,
            chat_history_turns: config.analysis.chat_history_turns,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis: DashboardAnalysis,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub chart: Option<ChartConfig>,
    pub warnings: Vec<String>,
    /// True when `text` is the fallback reply.
    pub degraded: bool,
}

impl ChatReply {
    pub fn fallback() -> Self {
        Self {
            text: prompts::FALLBACK_REPLY.to_string(),
            chart: None,
            warnings: Vec::new(),
            degraded: true,
        }
    }
}

pub struct AnalysisEngine {
    llm: Arc<dyn LLMAdapter>,
    settings: AnalysisSettings,
}

impl AnalysisEngine {
    pub fn new(llm: Arc<dyn LLMAdapter>, settings: AnalysisSettings) -> Self {
        Self { llm, settings }
    }

    /// Engine backed by the provider selected in configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let llm = LLM::from_config(&config.llm)?;
        info!(provider = %llm.provider(), model = %config.llm.model, "Analysis engine ready");
        Ok(Self::new(Arc::new(llm), AnalysisSettings::from_config(config)))
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    fn request(&self, messages: Vec<LLMMessage>, schema: serde_json::Value) -> LLMRequest {
        LLMRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system_instruction: Some(prompts::SYSTEM_INSTRUCTION.to_string()),
            response_schema: Some(schema),
        }
    }

    pub async fn request_initial_analysis(&self, dataset: &Dataset) -> AppResult<AnalysisOutcome> {
        if dataset.is_empty() {
            return Err(AppError::Analysis("dataset has no rows".to_string()));
        }

        let limit = self.settings.analysis_sample_rows;
        let prompt = prompts::initial_analysis_prompt(dataset.columns(), &sample(dataset, limit), limit);
        let request = self.request(vec![LLMMessage::user(prompt)], schema::analysis_schema());

        info!(
            rows = dataset.len(),
            columns = dataset.columns().len(),
            sample_rows = limit.min(dataset.len()),
            "Requesting initial analysis"
        );

        let response = self.llm.create_chat_completion(&request).await.map_err(|e| {
            warn!(error = %e, "Initial analysis request failed");
            AppError::Analysis(e.to_string())
        })?;

        let validated = schema::validate_analysis(&response.content, dataset.columns()).map_err(|e| {
            warn!(error = %e, "Initial analysis response rejected");
            AppError::Analysis(e)
        })?;

        for warning in &validated.warnings {
            warn!(warning = %warning, "Analysis validation warning");
        }
        info!(
            title = %validated.analysis.dataset_title,
            charts = validated.analysis.charts.len(),
            tokens = response.usage.total_tokens,
            "Initial analysis complete"
        );

        Ok(AnalysisOutcome {
            analysis: validated.analysis,
            warnings: validated.warnings,
        })
    }

    /// One conversational turn. `history` is the log *before* `user_message`.
    pub async fn request_chat_turn(
        &self,
        history: &[ChatMessage],
        user_message: &str,
        dataset: &Dataset,
    ) -> ChatReply {
        let prompt = prompts::chat_prompt(
            dataset.columns(),
            &sample(dataset, self.settings.chat_sample_rows),
            user_message,
        );
        let mut messages = history_messages(history, self.settings.chat_history_turns);
        messages.push(LLMMessage::user(prompt));
        let request = self.request(messages, schema::chat_schema());

        debug!(
            history = request.messages.len() - 1,
            message_len = user_message.len(),
            "Requesting chat turn"
        );

        let response = match self.llm.create_chat_completion(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Chat turn failed, using fallback reply");
                return ChatReply::fallback();
            }
        };

        match schema::validate_chat(&response.content, dataset.columns()) {
            Ok(validated) => {
                for warning in &validated.warnings {
                    warn!(warning = %warning, "Chat validation warning");
                }
                info!(has_chart = validated.chart.is_some(), "Chat turn complete");
                ChatReply {
                    text: validated.text,
                    chart: validated.chart,
                    warnings: validated.warnings,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "Chat response rejected, using fallback reply");
                ChatReply::fallback()
            }
        }
    }
}

/// Replays the tail of the log as prior turns. Leading model messages are
/// skipped so the replay always opens with a user turn.
fn history_messages(history: &[ChatMessage], limit: usize) -> Vec<LLMMessage> {
    let start = history.len().saturating_sub(limit);
    history[start..]
        .iter()
        .skip_while(|m| m.role == ChatRole::Model)
        .map(|m| match m.role {
            ChatRole::User => LLMMessage::user(m.content.clone()),
            ChatRole::Model => LLMMessage::assistant(m.content.clone()),
        })
        .collect()
}
