// OpenAI-compatible chat completions adapter
// Shared by OpenAI itself and by the Groq / OpenRouter wrappers, which speak
// the same wire format on a different base URL.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, LLMRole, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// How the vendor is asked for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredOutput {
    /// `response_format: json_schema` with the schema attached.
    JsonSchema,
    /// `response_format: json_object`; the schema travels in the system prompt.
    JsonObject,
}

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
    structured_output: StructuredOutput,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

impl OpenAIAdapter {
    pub fn with_client(client: Client, api_key: &str, api_base: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            structured_output: StructuredOutput::JsonSchema,
        }
    }

    pub fn structured_output(mut self, mode: StructuredOutput) -> Self {
        self.structured_output = mode;
        self
    }

    fn build_request(&self, request: &LLMRequest) -> ChatRequest {
        let mut system = request.system_instruction.clone();
        if let (Some(schema), StructuredOutput::JsonObject) =
            (&request.response_schema, self.structured_output)
        {
            let hint = format!("Respond with a JSON object matching this JSON Schema:\n{}", schema);
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, hint),
                None => hint,
            });
        }

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: match m.role {
                LLMRole::System => "system",
                LLMRole::User => "user",
                LLMRole::Assistant => "assistant",
            },
            content: m.content.clone(),
        }));

        let response_format = request.response_schema.as_ref().map(|schema| {
            match self.structured_output {
                StructuredOutput::JsonSchema => json!({
                    "type": "json_schema",
                    "json_schema": {"name": "response", "schema": schema}
                }),
                StructuredOutput::JsonObject => json!({"type": "json_object"}),
            }
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format,
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Chat completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "API error ({}): {} (type: {:?})",
                    status, error_response.error.message, error_response.error.error_type
                )));
            }
            return Err(AppError::LLMApi(format!("API error ({}): {}", status, error_text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse chat completion: {}", e)))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("API returned no choices".to_string()))?;

        let usage = chat_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![LLMMessage::user("hello")],
            max_tokens: None,
            temperature: Some(0.3),
            system_instruction: Some("Only output JSON.".to_string()),
            response_schema: Some(json!({"type": "object", "properties": {"textResponse": {"type": "string"}}})),
        }
    }

    #[test]
    fn test_json_schema_mode() {
        let adapter = OpenAIAdapter::with_client(Client::new(), "k", OPENAI_API_BASE);
        let body = serde_json::to_value(adapter.build_request(&request())).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Only output JSON.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["properties"]["textResponse"]["type"],
            "string"
        );
    }

    #[test]
    fn test_json_object_mode_moves_schema_into_prompt() {
        let adapter = OpenAIAdapter::with_client(Client::new(), "k", OPENAI_API_BASE)
            .structured_output(StructuredOutput::JsonObject);
        let body = serde_json::to_value(adapter.build_request(&request())).unwrap();
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with("Only output JSON."));
        assert!(system.contains("textResponse"));
    }

    #[tokio::test]
    async fn test_completion_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"textResponse\":\"hi\"}"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_client(Client::new(), "secret", &server.url());
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "{\"textResponse\":\"hi\"}");
        assert_eq!(response.usage.total_tokens, 8);
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached","type":"rate_limit"}}"#)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_client(Client::new(), "k", &server.url());
        match adapter.create_chat_completion(&request()).await {
            Err(AppError::LLMApi(message)) => assert!(message.contains("Rate limit reached")),
            other => panic!("unexpected result: {:?}", other.map(|r| r.content)),
        }
    }
}
