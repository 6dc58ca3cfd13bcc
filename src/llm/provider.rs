use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

/// The narrow seam to an external generative engine: one request in,
/// one completion (or an error) out. Adapters must honour
/// `LLMRequest::response_schema` by asking the vendor for JSON output.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Adapter selected from configuration.
pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::Config(format!("No API key configured for provider {}", config.provider))
        })?;
        let client = http_client(config.timeout_secs)?;
        let base = config.api_base.as_deref();

        let adapter: Box<dyn LLMAdapter> = match config.provider {
            LLMProvider::Google => Box::new(crate::llm::google::GoogleAdapter::with_client(
                client,
                &api_key,
                base.unwrap_or(crate::llm::google::GOOGLE_API_BASE),
            )),
            LLMProvider::OpenAI => Box::new(crate::llm::openai::OpenAIAdapter::with_client(
                client,
                &api_key,
                base.unwrap_or(crate::llm::openai::OPENAI_API_BASE),
            )),
            LLMProvider::Groq => Box::new(crate::llm::groq::GroqAdapter::with_client(
                client, &api_key,
            )),
            LLMProvider::OpenRouter => Box::new(
                crate::llm::openrouter::OpenRouterAdapter::with_client(client, &api_key),
            ),
        };

        Ok(Self {
            adapter,
            provider: config.provider,
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }
}

#[async_trait]
impl LLMAdapter for LLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

/// HTTP client shared by the adapters. The timeout bounds every engine call.
pub fn http_client(timeout_secs: u64) -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}
