use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AgentError;
use crate::models::{MessageRequest, MessageResponse};

/// A single-turn request/response language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, AgentError>;
}

/// Anthropic Messages API client
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    config: Config,
}

impl AnthropicClient {
    pub fn new(config: Config) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, AgentError> {
        info!(
            "Sending message request to model: {} (max_tokens {}, {} tools)",
            request.model,
            request.max_tokens,
            request.tools.as_ref().map_or(0, Vec::len)
        );
        debug!("Request: {:?}", request);

        let response = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.config.anthropic_base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.anthropic_api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error: {} - {}", status, error_text);
            return Err(AgentError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))?;

        info!(
            "Received response {} with {} content blocks (stop: {:?})",
            message.id,
            message.content.len(),
            message.stop_reason
        );
        if let Some(usage) = &message.usage {
            debug!(
                "Token usage for {}: {} in / {} out",
                message.model, usage.input_tokens, usage.output_tokens
            );
        }
        Ok(message)
    }
}
