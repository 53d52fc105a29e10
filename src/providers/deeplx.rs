use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;

use super::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// DeepLX bridge client (self-hosted, no API key)
#[derive(Debug)]
pub struct DeepLX {
    client: Client,
    name: String,
    api_key: String,
    /// Full translate URL, e.g. `http://localhost:1188/translate`
    endpoint: String,
    max_input_tokens: u32,
    max_output_tokens: u32,
    input_token_price: f64,
    output_token_price: f64,
    price_unit: String,
}

#[derive(Debug, Serialize)]
pub struct DeepLXRequest {
    text: String,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepLXResponse {
    pub code: i32,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeepLXRequest {
    pub fn new(text: &str, source_language: &str, target_language: &str) -> Self {
        let code = |c: &str| {
            if language_utils::is_auto(c) {
                "auto".to_string()
            } else {
                language_utils::to_api_code(c)
                    .unwrap_or_else(|_| c.to_string())
                    .to_uppercase()
            }
        };
        Self {
            text: text.to_string(),
            source_lang: code(source_language),
            target_lang: code(target_language),
        }
    }
}

impl DeepLX {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(timeout)?,
            name: config.name.clone(),
            api_key: config.api_key.clone(),
            endpoint: config.resolved_endpoint(),
            max_input_tokens: config.max_input_tokens,
            max_output_tokens: config.max_output_tokens,
            input_token_price: config.input_token_price,
            output_token_price: config.output_token_price,
            price_unit: config.price_unit.clone(),
        })
    }

    pub async fn translate(&self, request: &DeepLXRequest) -> Result<DeepLXResponse, ProviderError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        let body = response
            .json::<DeepLXResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        // DeepLX reports failures in the body with HTTP 200
        if body.code != 200 {
            let message = body.message.clone().unwrap_or_else(|| "unknown error".to_string());
            return Err(ProviderError::from_status(body.code.clamp(0, 999) as u16, message));
        }
        Ok(body)
    }
}

#[async_trait]
impl ProviderClient for DeepLX {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let deeplx_request =
            DeepLXRequest::new(&request.text, &request.source_language, &request.target_language);
        let response = self.translate(&deeplx_request).await?;

        Ok(Completion {
            input_tokens: estimate_tokens(&request.text) as u64,
            output_tokens: estimate_tokens(&response.data) as u64,
            text: response.data,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::DeepLX
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
