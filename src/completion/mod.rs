// Completion service clients
//
// The orchestrator only needs "send a prompt, get text back". Each service
// gets its own client behind the CompletionClient trait:
// - Ollama: local `/api/generate`
// - OpenAI: `/v1/chat/completions` with a bearer key
//
// Every failure to obtain usable text is reported as LingoError::Transport so
// the orchestrator can retry it.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{CompletionConfig, Provider};
use crate::error::Result;

/// Text-completion collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one prompt and return the generated text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check that the service answers and knows the configured model
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating completion clients
pub struct CompletionClientFactory;

impl CompletionClientFactory {
    /// Create a client for the configured provider
    pub fn create_client(config: &CompletionConfig) -> Result<Box<dyn CompletionClient>> {
        let timeout = Duration::from_secs(config.timeout_secs);
        match config.provider {
            Provider::Ollama => Ok(Box::new(ollama::OllamaClient::new(config, timeout)?)),
            Provider::OpenAi => Ok(Box::new(openai::OpenAiClient::new(config, timeout)?)),
        }
    }
}

/// Shorten a response body for error messages
pub(crate) fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
