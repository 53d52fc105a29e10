/*!
 * Provider implementations for different translation services.
 *
 * Every backend is served through the `ProviderClient` trait:
 * - `openai`: OpenAI-style chat completions (also used for local model servers)
 * - `deepl`: DeepL API
 * - `google`: Google Cloud Translation v2
 * - `deeplx`: DeepLX self-hosted bridge
 * - `libretranslate`: LibreTranslate
 * - `raw`: passthrough that echoes its input
 * - `mock`: scripted client for tests
 *
 * The only place that looks at a provider's type is `create_client`.
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::{TranslationError, ValidationError};

pub mod deepl;
pub mod deeplx;
pub mod google;
pub mod libretranslate;
pub mod mock;
pub mod openai;
pub mod raw;

/// Request handed to a provider for one pipeline stage
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Instruction prompt for prompt-driven providers
    pub prompt: String,

    /// Optional system prompt for chat-style providers
    pub system_prompt: Option<String>,

    /// Plain text input for machine translation providers
    pub text: String,

    /// Model requested by the stage
    pub model: String,

    /// Source language code (may be `auto`)
    pub source_language: String,

    /// Target language code
    pub target_language: String,

    /// Maximum completion tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

/// Provider output with token accounting
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Closed set of supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    DeepL,
    Google,
    DeepLX,
    LibreTranslate,
    Local,
    Raw,
}

impl ProviderType {
    /// Capitalized provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::DeepL => "DeepL",
            Self::Google => "Google Translate",
            Self::DeepLX => "DeepLX",
            Self::LibreTranslate => "LibreTranslate",
            Self::Local => "Local model",
            Self::Raw => "Raw",
        }
    }

    /// Lowercase identifier used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::DeepL => "deepl",
            Self::Google => "google",
            Self::DeepLX => "deeplx",
            Self::LibreTranslate => "libretranslate",
            Self::Local => "local",
            Self::Raw => "raw",
        }
    }

    /// Whether the backend follows free-form instructions.
    ///
    /// Only these can serve reflection and improvement stages.
    pub fn follows_instructions(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Local | Self::Raw)
    }

    /// Whether the backend needs an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::DeepL | Self::Google)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deepl" => Ok(Self::DeepL),
            "google" => Ok(Self::Google),
            "deeplx" => Ok(Self::DeepLX),
            "libretranslate" => Ok(Self::LibreTranslate),
            "local" => Ok(Self::Local),
            "raw" => Ok(Self::Raw),
            _ => Err(ValidationError::UnknownProvider(s.to_string())),
        }
    }
}

/// Rough token estimate: four characters per token, rounded up
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}

/// Common interface for all translation backends.
///
/// Implementations hold only read-only configuration and a connection pool,
/// so one instance may serve every worker concurrently.
#[async_trait]
pub trait ProviderClient: Send + Sync + Debug {
    /// Run one completion. Implementations call `validate_request` before
    /// touching the network.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError>;

    /// Configured name of this client
    fn name(&self) -> &str;

    fn provider_type(&self) -> ProviderType;

    /// Input token limit, 0 for unlimited
    fn max_input_tokens(&self) -> u32;

    /// Output token limit, 0 for unlimited
    fn max_output_tokens(&self) -> u32;

    fn input_token_price(&self) -> f64;

    fn output_token_price(&self) -> f64;

    /// Unit the prices are quoted in
    fn price_unit(&self) -> &str;

    /// Reject requests exceeding the token limits
    fn validate_request(&self, request: &CompletionRequest) -> Result<(), ValidationError> {
        let input = if self.provider_type().follows_instructions() {
            let system = request.system_prompt.as_deref().unwrap_or_default();
            estimate_tokens(system) + estimate_tokens(&request.prompt)
        } else {
            estimate_tokens(&request.text)
        };

        let max_input = self.max_input_tokens();
        if max_input > 0 && input > max_input {
            return Err(ValidationError::InputTooLarge {
                provider: self.name().to_string(),
                estimated: input,
                limit: max_input,
            });
        }

        let max_output = self.max_output_tokens();
        if max_output > 0 && request.max_tokens > max_output {
            return Err(ValidationError::OutputTooLarge {
                provider: self.name().to_string(),
                requested: request.max_tokens,
                limit: max_output,
            });
        }

        Ok(())
    }
}

/// Build an HTTP client with the request deadline applied.
///
/// A builder failure is returned rather than replaced by a client without
/// the deadline.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, crate::errors::ProviderError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Turn a non-success response into a provider error
pub(crate) async fn error_from_response(response: reqwest::Response) -> crate::errors::ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    crate::errors::ProviderError::from_status(status, body)
}

/// Construct the client for a provider configuration
pub fn create_client(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn ProviderClient>, crate::errors::ProviderError> {
    let client: Arc<dyn ProviderClient> = match config.provider_type {
        ProviderType::OpenAI | ProviderType::Local => {
            Arc::new(openai::OpenAI::from_config(config, timeout)?)
        }
        ProviderType::DeepL => Arc::new(deepl::DeepL::from_config(config, timeout)?),
        ProviderType::Google => Arc::new(google::GoogleTranslate::from_config(config, timeout)?),
        ProviderType::DeepLX => Arc::new(deeplx::DeepLX::from_config(config, timeout)?),
        ProviderType::LibreTranslate => {
            Arc::new(libretranslate::LibreTranslate::from_config(config, timeout)?)
        }
        ProviderType::Raw => Arc::new(raw::RawProvider::from_config(config)),
    };
    Ok(client)
}

/// Clients by configured name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one client per provider configuration
    pub fn from_configs(
        configs: &[ProviderConfig],
        timeout: Duration,
    ) -> Result<Self, crate::errors::ProviderError> {
        let clients = configs
            .iter()
            .map(|c| create_client(c, timeout).map(|client| (c.name.clone(), client)))
            .collect::<Result<_, _>>()?;
        Ok(Self { clients })
    }

    /// Register a client under `name`, replacing any previous one
    pub fn with_client(mut self, name: &str, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(name.to_string(), client);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ProviderClient>, ValidationError> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownProvider(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }
}
