// Deterministic adapter: replays queued completions and records every request.
// Used by the test suites in place of a real provider.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

#[derive(Default)]
pub struct ScriptedAdapter {
    replies: Mutex<VecDeque<(AppResult<String>, Duration)>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion with the given text.
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()));
        self
    }

    /// Queue a failed completion.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(AppError::LLMApi(message.into())));
        self
    }

    /// Queue a successful completion that only arrives after `delay`.
    pub fn reply_after(self, content: impl Into<String>, delay: Duration) -> Self {
        self.push_delayed(Ok(content.into()), delay);
        self
    }

    pub fn push(&self, reply: AppResult<String>) {
        self.push_delayed(reply, Duration::ZERO);
    }

    fn push_delayed(&self, reply: AppResult<String>, delay: Duration) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back((reply, delay));
        }
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LLMAdapter for ScriptedAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AppError::Internal("scripted adapter lock poisoned".to_string()))?
            .pop_front();

        let next = match next {
            Some((reply, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Some(reply)
            }
            None => None,
        };

        match next {
            Some(Ok(content)) => Ok(LLMResponse {
                content,
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(AppError::LLMApi("no scripted reply left".to_string())),
        }
    }
}
