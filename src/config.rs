use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

use crate::ingest::Splitter;
use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub google_api_key: String,
    pub openai_api_key: String,
    pub groq_api_key: String,
    pub openrouter_api_key: String,
    /// Overrides the provider's default endpoint (proxies, local gateways).
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub analysis_sample_rows: usize,
    pub chat_sample_rows: usize,
    pub chat_history_turns: usize,
    pub splitter: Splitter,
}

impl LLMConfig {
    /// The API key for the selected provider, if one is configured.
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider {
            LLMProvider::Google => &self.google_api_key,
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::Groq => &self.groq_api_key,
            LLMProvider::OpenRouter => &self.openrouter_api_key,
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

fn default_model(provider: LLMProvider) -> &'static str {
    match provider {
        LLMProvider::Google => "gemini-2.5-flash",
        LLMProvider::OpenAI => "gpt-4o-mini",
        LLMProvider::Groq => "llama-3.3-70b-versatile",
        LLMProvider::OpenRouter => "google/gemini-2.5-flash",
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Google,
            model: default_model(LLMProvider::Google).to_string(),
            google_api_key: String::new(),
            openai_api_key: String::new(),
            groq_api_key: String::new(),
            openrouter_api_key: String::new(),
            api_base: None,
            timeout_secs: 60,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_sample_rows: 30,
            chat_sample_rows: 20,
            chat_history_turns: 6,
            splitter: Splitter::Simple,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LLMConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source. Unset keys fall
    /// back to the defaults; set-but-unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider: LLMProvider = match var("LLM_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => defaults.llm.provider,
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_or(var("PORT"), "PORT", defaults.server.port)?,
                host: var("HOST").unwrap_or(defaults.server.host),
                cors_allowed_origins: var("ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.server.cors_allowed_origins),
                max_upload_bytes: parse_or(
                    var("MAX_UPLOAD_BYTES"),
                    "MAX_UPLOAD_BYTES",
                    defaults.server.max_upload_bytes,
                )?,
            },
            llm: LLMConfig {
                provider,
                model: var("LLM_MODEL").unwrap_or_else(|| default_model(provider).to_string()),
                google_api_key: var("GOOGLE_API_KEY")
                    .or_else(|| var("GEMINI_API_KEY"))
                    .or_else(|| var("API_KEY"))
                    .unwrap_or_default(),
                openai_api_key: var("OPENAI_API_KEY").unwrap_or_default(),
                groq_api_key: var("GROQ_API_KEY").unwrap_or_default(),
                openrouter_api_key: var("OPENROUTER_API_KEY").unwrap_or_default(),
                api_base: var("LLM_API_BASE"),
                timeout_secs: parse_or(
                    var("LLM_TIMEOUT_SECS"),
                    "LLM_TIMEOUT_SECS",
                    defaults.llm.timeout_secs,
                )?,
                temperature: var("LLM_TEMPERATURE")
                    .map(|v| v.parse().context("LLM_TEMPERATURE must be a number"))
                    .transpose()?,
                max_tokens: var("LLM_MAX_TOKENS")
                    .map(|v| v.parse().context("LLM_MAX_TOKENS must be an integer"))
                    .transpose()?,
            },
            analysis: AnalysisConfig {
                analysis_sample_rows: parse_or(
                    var("ANALYSIS_SAMPLE_ROWS"),
                    "ANALYSIS_SAMPLE_ROWS",
                    defaults.analysis.analysis_sample_rows,
                )?,
                chat_sample_rows: parse_or(
                    var("CHAT_SAMPLE_ROWS"),
                    "CHAT_SAMPLE_ROWS",
                    defaults.analysis.chat_sample_rows,
                )?,
                chat_history_turns: parse_or(
                    var("CHAT_HISTORY_TURNS"),
                    "CHAT_HISTORY_TURNS",
                    defaults.analysis.chat_history_turns,
                )?,
                splitter: match var("CSV_SPLITTER") {
                    Some(raw) => raw.parse()?,
                    None => defaults.analysis.splitter,
                },
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.provider, LLMProvider::Google);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.analysis.analysis_sample_rows, 30);
        assert_eq!(config.analysis.chat_sample_rows, 20);
        assert_eq!(config.analysis.splitter, Splitter::Simple);
        assert!(config.llm.active_api_key().is_none());
    }

    #[test]
    fn test_provider_selects_model_and_key() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_PROVIDER", "groq"),
            ("GROQ_API_KEY", "gsk-test"),
            ("GOOGLE_API_KEY", "unused"),
        ]))
        .unwrap();
        assert_eq!(config.llm.provider, LLMProvider::Groq);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.active_api_key().as_deref(), Some("gsk-test"));
    }

    #[test]
    fn test_gemini_key_fallbacks() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "legacy")])).unwrap();
        assert_eq!(config.llm.active_api_key().as_deref(), Some("legacy"));
    }

    #[test]
    fn test_overrides_and_lists() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
            ("CHAT_SAMPLE_ROWS", "5"),
            ("CSV_SPLITTER", "quoted"),
            ("LLM_TEMPERATURE", "0.2"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.analysis.chat_sample_rows, 5);
        assert_eq!(config.analysis.splitter, Splitter::QuoteAware);
        assert_eq!(config.llm.temperature, Some(0.2));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LLM_PROVIDER", "mystery")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CSV_SPLITTER", "tabs")])).is_err());
    }
}
