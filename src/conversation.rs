//! Chat log and the busy flag that serializes engine calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::charts::ChartConfig;
use crate::types::{AppError, AppResult};

pub const WELCOME_MESSAGE: &str = "Hello! Upload a CSV file and I will analyze it for you.";

pub fn announcement(dataset_title: &str) -> String {
    format!(
        "I've analyzed your data! Here is a dashboard summarizing \"{}\". \
         You can ask me questions about specific trends.",
        dataset_title
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_chart: Option<ChartConfig>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            related_chart: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_chart(mut self, chart: Option<ChartConfig>) -> Self {
        self.related_chart = chart;
        self
    }
}

/// Append-only message log. `busy` is true while an engine call
/// (initial analysis or chat turn) is outstanding.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    busy: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn acquire(&mut self) -> AppResult<()> {
        if self.busy {
            return Err(AppError::Busy(
                "a previous request is still being processed".to_string(),
            ));
        }
        self.busy = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.busy = false;
    }

    /// Accept a user message: rejected without touching the log while busy.
    pub fn accept(&mut self, message: ChatMessage) -> AppResult<()> {
        self.acquire()?;
        debug!(id = %message.id, "User message accepted");
        self.messages.push(message);
        Ok(())
    }

    /// Append the engine's reply and clear the busy flag.
    pub fn complete(&mut self, reply: ChatMessage) {
        self.messages.push(reply);
        self.busy = false;
    }
}
