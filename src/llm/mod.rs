//! LLM integration for inbox-pilot.
//!
//! Supports:
//! - **Anthropic**: Messages API over reqwest
//! - **OpenAI**: chat-completions API over reqwest (or any compatible
//!   endpoint via a custom base URL)
//!
//! Both backends sit behind the `LlmProvider` trait so the triage
//! policy never sees which one is in play — tests swap in stubs.

mod anthropic;
mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use crate::error::ConfigError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl std::str::FromStr for LlmBackend {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::InvalidValue {
                key: "backend".into(),
                message: format!("unknown backend '{}'", other),
            }),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Override the API endpoint (OpenAI-compatible servers, proxies).
    pub base_url: Option<String>,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match config.backend {
        LlmBackend::Anthropic => {
            tracing::info!(model = %config.model, "Using Anthropic");
            match &config.base_url {
                Some(url) => Arc::new(AnthropicProvider::with_base_url(
                    config.api_key.clone(),
                    &config.model,
                    url,
                )),
                None => Arc::new(AnthropicProvider::new(config.api_key.clone(), &config.model)),
            }
        }
        LlmBackend::OpenAi => {
            tracing::info!(model = %config.model, "Using OpenAI");
            match &config.base_url {
                Some(url) => Arc::new(OpenAiProvider::with_base_url(
                    config.api_key.clone(),
                    &config.model,
                    url,
                )),
                None => Arc::new(OpenAiProvider::new(config.api_key.clone(), &config.model)),
            }
        }
    }
}
