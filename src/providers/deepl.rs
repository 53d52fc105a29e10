use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;

use super::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// DeepL API client
#[derive(Debug)]
pub struct DeepL {
    client: Client,
    name: String,
    api_key: String,
    /// Base URL, `https://api-free.deepl.com` or `https://api.deepl.com`
    endpoint: String,
    max_input_tokens: u32,
    max_output_tokens: u32,
    input_token_price: f64,
    output_token_price: f64,
    price_unit: String,
}

/// DeepL `/v2/translate` request
#[derive(Debug, Serialize)]
pub struct DeepLRequest {
    text: Vec<String>,
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    pub text: String,
    #[serde(default)]
    pub detected_source_language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    pub translations: Vec<DeepLTranslation>,
}

impl DeepLRequest {
    /// Build a request; DeepL expects upper-case codes and no source for auto-detection
    pub fn new(text: &str, source_language: &str, target_language: &str) -> Self {
        let upper = |code: &str| {
            language_utils::to_api_code(code)
                .unwrap_or_else(|_| code.to_string())
                .to_uppercase()
        };
        Self {
            text: vec![text.to_string()],
            target_lang: upper(target_language),
            source_lang: if language_utils::is_auto(source_language) || source_language.is_empty() {
                None
            } else {
                Some(upper(source_language))
            },
        }
    }
}

impl DeepL {
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

    pub async fn translate(&self, request: &DeepLRequest) -> Result<DeepLResponse, ProviderError> {
        let url = format!("{}/v2/translate", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        response
            .json::<DeepLResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for DeepL {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let deepl_request =
            DeepLRequest::new(&request.text, &request.source_language, &request.target_language);
        let response = self.translate(&deepl_request).await?;
        let text = response
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ProviderError::ParseError("DeepL returned no translations".to_string()))?;

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
        ProviderType::DeepL
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
