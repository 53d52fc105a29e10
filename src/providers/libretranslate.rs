use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;

use super::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// LibreTranslate client
#[derive(Debug)]
pub struct LibreTranslate {
    client: Client,
    name: String,
    api_key: String,
    endpoint: String,
    max_input_tokens: u32,
    max_output_tokens: u32,
    input_token_price: f64,
    output_token_price: f64,
    price_unit: String,
}

#[derive(Debug, Serialize)]
pub struct LibreRequest {
    q: String,
    source: String,
    target: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibreResponse {
    pub translated_text: String,
}

impl LibreRequest {
    pub fn new(text: &str, source_language: &str, target_language: &str, api_key: &str) -> Self {
        let code = |c: &str| {
            if language_utils::is_auto(c) {
                "auto".to_string()
            } else {
                language_utils::to_api_code(c).unwrap_or_else(|_| c.to_string())
            }
        };
        Self {
            q: text.to_string(),
            source: code(source_language),
            target: code(target_language),
            format: "text".to_string(),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
        }
    }
}

impl LibreTranslate {
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

    pub async fn translate(&self, request: &LibreRequest) -> Result<LibreResponse, ProviderError> {
        let url = format!("{}/translate", self.endpoint.trim_end_matches('/'));
        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        response
            .json::<LibreResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for LibreTranslate {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let libre_request = LibreRequest::new(
            &request.text,
            &request.source_language,
            &request.target_language,
            &self.api_key,
        );
        let response = self.translate(&libre_request).await?;

        Ok(Completion {
            input_tokens: estimate_tokens(&request.text) as u64,
            output_tokens: estimate_tokens(&response.translated_text) as u64,
            text: response.translated_text,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::LibreTranslate
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
