use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::CompletionConfig;
use crate::error::{Result, LingoError};
use super::{CompletionClient, excerpt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Client for OpenAI compatible chat completion endpoints
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig, timeout: Duration) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LingoError::Config("the openai provider needs an API key".to_string())
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
            model: config.model().to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Pull the first choice's text out of a chat completion reply
fn first_choice(response: ChatResponse) -> Result<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LingoError::Transport("Empty completion received".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!("Sending completion request to: {}", url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| LingoError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LingoError::Transport("Rate limited by OpenAI API".to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LingoError::Transport(format!(
                "OpenAI API error {}: {}", status, excerpt(&error_text)
            )));
        }

        let chat: ChatResponse = response.json().await
            .map_err(|e| LingoError::Transport(format!("Failed to parse response: {}", e)))?;

        let text = first_choice(chat)?;
        debug!("Raw OpenAI response:\n{}", text);
        Ok(text)
    }

    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/v1/models/{}", self.endpoint, self.model);

        let response = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LingoError::Transport(format!("Failed to connect to OpenAI: {}", e)))?;

        if response.status().is_success() {
            info!("OpenAI model '{}' is available", self.model);
            Ok(())
        } else {
            Err(LingoError::Transport(format!(
                "OpenAI model '{}' is not available: HTTP {}",
                self.model,
                response.status()
            )))
        }
    }
}
