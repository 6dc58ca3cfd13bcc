use crate::llm::openai::{OpenAIAdapter, StructuredOutput};
use crate::llm::provider::LLMAdapter;
use crate::types::{AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;
use reqwest::Client;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

pub struct GroqAdapter {
    inner: OpenAIAdapter,
}

impl GroqAdapter {
    pub fn with_client(client: Client, api_key: &str) -> Self {
        // json_schema is only available on a few Groq models; JSON mode works on all
        Self {
            inner: OpenAIAdapter::with_client(client, api_key, GROQ_API_BASE)
                .structured_output(StructuredOutput::JsonObject),
        }
    }
}

#[async_trait]
impl LLMAdapter for GroqAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.inner.create_chat_completion(request).await
    }
}
