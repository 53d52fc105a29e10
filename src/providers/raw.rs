use async_trait::async_trait;

use crate::app_config::ProviderConfig;
use crate::errors::TranslationError;

use super::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// Passthrough provider that returns its input text unchanged.
///
/// Useful for dry runs and for checking document round-trips without
/// spending tokens.
#[derive(Debug, Clone)]
pub struct RawProvider {
    name: String,
    max_input_tokens: u32,
    max_output_tokens: u32,
}

impl RawProvider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_input_tokens: config.max_input_tokens,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[async_trait]
impl ProviderClient for RawProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let tokens = estimate_tokens(&request.text) as u64;
        Ok(Completion {
            text: request.text.clone(),
            input_tokens: tokens,
            output_tokens: tokens,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Raw
    }

    fn max_input_tokens(&self) -> u32 {
        self.max_input_tokens
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    fn input_token_price(&self) -> f64 {
        0.0
    }

    fn output_token_price(&self) -> f64 {
        0.0
    }

    fn price_unit(&self) -> &str {
        "USD"
    }
}
