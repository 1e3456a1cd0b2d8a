//! Ollama (local) gateway implementation
//!
//! Non-streaming chat completion against the Ollama HTTP API. The request is
//! a plain role-tagged message list; sampling parameters travel in the
//! `options` object (`num_predict` is Ollama's name for the output cap).

use crate::{error::GatewayError, Gateway};
use async_trait::async_trait;
use maestro_foundation::{ChatMessage, Completion, GenerationOptions, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 600; // Longer timeout for local models

/// Gateway backed by an Ollama server
pub struct OllamaGateway {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGateway {
    /// Create a new Ollama gateway with default settings
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        self
    }

    /// Model identifier this gateway requests
    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> OllamaRequest {
        let api_messages = messages
            .iter()
            .map(|msg| OllamaMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect();

        OllamaRequest {
            model: self.model.clone(),
            messages: api_messages,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }

    /// Check if the Ollama server is reachable
    pub async fn ping(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Gateway for OllamaGateway {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerationOptions,
    ) -> Result<Completion, GatewayError> {
        let request = self.build_request(&messages, options);
        let started = Instant::now();
        debug!(model = %self.model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(self.chat_url())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(model = %self.model, %status, "Chat request rejected");
            return Err(match status.as_u16() {
                404 => GatewayError::ModelNotFound(format!(
                    "Model '{}' not found. Run 'ollama pull {}' first.",
                    self.model, self.model
                )),
                _ => GatewayError::ServerError(format!("Ollama error: {}", body)),
            });
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let completion = Completion {
            content: api_response.message.content,
            usage: TokenUsage {
                prompt_tokens: api_response.prompt_eval_count.unwrap_or(0),
                completion_tokens: api_response.eval_count.unwrap_or(0),
            },
            response_time_seconds: started.elapsed().as_secs_f64(),
        };
        debug!(
            model = %self.model,
            seconds = completion.response_time_seconds,
            "Chat request completed"
        );
        Ok(completion)
    }

    async fn health_check(&self) -> bool {
        self.ping().await
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        let gateway = OllamaGateway::new("http://localhost:11434", "llama3.2");
        assert_eq!(gateway.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_build_request_keeps_roles_in_order() {
        let gateway = OllamaGateway::new("http://localhost:11434", "llama3.2");
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("plan this"),
        ];
        let request = gateway.build_request(&messages, GenerationOptions::default());

        assert_eq!(request.model, "llama3.2");
        assert!(!request.stream);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, "plan this");
    }

    #[test]
    fn test_response_parsing_without_counts() {
        let body = r#"{"message":{"role":"assistant","content":"done"},"done":true}"#;
        let parsed: OllamaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "done");
        assert!(parsed.eval_count.is_none());
    }
}
