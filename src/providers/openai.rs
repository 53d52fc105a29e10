use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, TranslationError};

use super::{Completion, CompletionRequest, ProviderClient, ProviderType};

/// OpenAI-style chat completions client.
///
/// Also serves local model servers (Ollama, LM Studio, llama.cpp) that
/// expose the same `/chat/completions` route.
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// Configured provider name
    name: String,
    /// `OpenAI` or `Local`
    provider_type: ProviderType,
    /// API key (may be empty for local servers)
    api_key: String,
    /// Base URL including the version prefix, e.g. `https://api.openai.com/v1`
    endpoint: String,
    max_input_tokens: u32,
    max_output_tokens: u32,
    input_token_price: f64,
    output_token_price: f64,
    price_unit: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl OpenAIRequest {
    /// Create a new request for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Add a message to the conversation
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl OpenAI {
    /// Create a client from provider configuration
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(timeout)?,
            name: config.name.clone(),
            provider_type: config.provider_type,
            api_key: config.api_key.clone(),
            endpoint: config.resolved_endpoint(),
            max_input_tokens: config.max_input_tokens,
            max_output_tokens: config.max_output_tokens,
            input_token_price: config.input_token_price,
            output_token_price: config.output_token_price,
            price_unit: config.price_unit.clone(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Send a chat completion request
    pub async fn send(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let mut builder = self
            .client
            .post(self.api_url())
            .header("Content-Type", "application/json")
            .json(request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract the first choice's text
    pub fn extract_text(response: &OpenAIResponse) -> Option<String> {
        response.choices.first().map(|c| c.message.content.clone())
    }
}

#[async_trait]
impl ProviderClient for OpenAI {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let mut chat = OpenAIRequest::new(request.model.clone());
        if let Some(system) = &request.system_prompt {
            chat = chat.add_message("system", system.clone());
        }
        let chat = chat
            .add_message("user", request.prompt.clone())
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);

        let response = self.send(&chat).await?;
        let text = Self::extract_text(&response).ok_or_else(|| {
            ProviderError::ParseError("OpenAI-compatible provider returned no choices".to_string())
        })?;

        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                super::estimate_tokens(&request.prompt) as u64,
                super::estimate_tokens(&text) as u64,
            ),
        };

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn max_input_tokens(&self) -> u32 {
        self.max_input_tokens
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    fn input_token_price(&self) -> f64 {
        self.input_token_price
    }

    fn output_token_price(&self) -> f64 {
        self.output_token_price
    }

    fn price_unit(&self) -> &str {
        &self.price_unit
    }
}
