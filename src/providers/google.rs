use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;

use super::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// Google Cloud Translation (v2 REST) client
#[derive(Debug)]
pub struct GoogleTranslate {
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
pub struct GoogleRequest {
    q: String,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    format: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTranslation {
    pub translated_text: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleData {
    pub translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleResponse {
    pub data: GoogleData,
}

impl GoogleRequest {
    pub fn new(text: &str, source_language: &str, target_language: &str) -> Self {
        let code = |c: &str| language_utils::to_api_code(c).unwrap_or_else(|_| c.to_string());
        Self {
            q: text.to_string(),
            target: code(target_language),
            source: if language_utils::is_auto(source_language) || source_language.is_empty() {
                None
            } else {
                Some(code(source_language))
            },
            format: "text".to_string(),
        }
    }
}

impl GoogleTranslate {
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

    pub async fn translate(&self, request: &GoogleRequest) -> Result<GoogleResponse, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        response
            .json::<GoogleResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for GoogleTranslate {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let google_request =
            GoogleRequest::new(&request.text, &request.source_language, &request.target_language);
        let response = self.translate(&google_request).await?;
        let text = response
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ProviderError::ParseError("Google returned no translations".to_string()))?;

        Ok(Completion {
            input_tokens: estimate_tokens(&request.text) as u64,
            output_tokens: estimate_tokens(&text) as u64,
            text,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
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
