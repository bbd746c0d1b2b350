use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::CompletionConfig;
use crate::error::{Result, LingoError};
use super::{CompletionClient, excerpt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

/// Client for a local or remote Ollama server
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &CompletionConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending completion request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| LingoError::Transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LingoError::Transport(format!(
                "Ollama API error {}: {}", status, excerpt(&error_text)
            )));
        }

        let generated: GenerateResponse = response.json().await
            .map_err(|e| LingoError::Transport(format!("Failed to parse response: {}", e)))?;

        let text = generated.response.trim().to_string();
        debug!("Raw Ollama response:\n{}", text);

        if text.is_empty() {
            return Err(LingoError::Transport("Empty completion received".to_string()));
        }

        Ok(text)
    }

    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.endpoint);

        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| LingoError::Transport(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.model);
            Ok(())
        } else {
            Err(LingoError::Transport(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.model, self.model
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let config = CompletionConfig {
            endpoint: Some("http://gpu-box:11434/".to_string()),
            temperature: 0.2,
            max_tokens: 512,
            ..CompletionConfig::default()
        };
        let client = OllamaClient::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint, "http://gpu-box:11434");

        let body = serde_json::to_value(client.request("hello")).unwrap();
        assert_eq!(body["model"], "llama3.2:3b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 512);
    }

    #[test]
    fn test_response_ignores_stream_metadata() {
        let body = r#"{"model":"llama3.2:3b","response":"szia","done":true,"eval_count":3}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response, "szia");
    }
}
