use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::ValidationError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::providers::ProviderType;
use crate::translation::steps::StepSet;

/// Application configuration module
///
/// Loading, validating and saving `conf.json`. A missing file is replaced by
/// the defaults so a first run works against a local model server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO 639-1/639-2, or `auto`)
    pub source_language: String,

    /// Target language code (ISO 639-1/639-2)
    pub target_language: String,

    /// Scheduler, cache and session settings
    #[serde(default)]
    pub engine: EngineOptions,

    /// Configured provider clients, referenced by name from step sets
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Available step sets
    #[serde(default = "default_step_sets")]
    pub step_sets: Vec<StepSet>,

    /// Id of the step set used for runs
    #[serde(default = "default_active_step_set")]
    pub active_step_set: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Engine tuning knobs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EngineOptions {
    /// Number of nodes translated at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries after the first attempt for retryable failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff sleep
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline for one provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Skip cache lookups (results are still written)
    #[serde(default)]
    pub force_refresh: bool,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            force_refresh: false,
            cache_enabled: true,
            cache_dir: default_cache_dir(),
            session_dir: default_session_dir(),
        }
    }
}

/// One configured provider client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Name step configurations refer to
    pub name: String,

    /// Backend variant
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    #[serde(default)]
    pub api_key: String,

    /// Service URL, empty for the backend's default
    #[serde(default)]
    pub endpoint: String,

    /// Input token limit, 0 for unlimited
    #[serde(default)]
    pub max_input_tokens: u32,

    /// Output token limit, 0 for unlimited
    #[serde(default)]
    pub max_output_tokens: u32,

    /// Price per million input tokens
    #[serde(default)]
    pub input_token_price: f64,

    /// Price per million output tokens
    #[serde(default)]
    pub output_token_price: f64,

    #[serde(default = "default_price_unit")]
    pub price_unit: String,
}

impl ProviderConfig {
    /// Provider config with the defaults of its backend
    pub fn new(name: &str, provider_type: ProviderType) -> Self {
        let (max_input_tokens, max_output_tokens, input_token_price, output_token_price) =
            match provider_type {
                ProviderType::OpenAI => (128_000, 16_384, 0.15, 0.60),
                ProviderType::Local => (8_192, 4_096, 0.0, 0.0),
                ProviderType::DeepL | ProviderType::Google => (32_000, 0, 0.0, 0.0),
                ProviderType::DeepLX | ProviderType::LibreTranslate | ProviderType::Raw => {
                    (0, 0, 0.0, 0.0)
                }
            };

        Self {
            name: name.to_string(),
            provider_type,
            api_key: String::new(),
            endpoint: default_endpoint(provider_type).to_string(),
            max_input_tokens,
            max_output_tokens,
            input_token_price,
            output_token_price,
            price_unit: default_price_unit(),
        }
    }

    /// Configured endpoint, or the backend's default when unset
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.trim().is_empty() {
            default_endpoint(self.provider_type).to_string()
        } else {
            self.endpoint.trim().to_string()
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_endpoint(provider_type: ProviderType) -> &'static str {
    match provider_type {
        ProviderType::OpenAI => "https://api.openai.com/v1",
        // Ollama serves the OpenAI-compatible API under /v1
        ProviderType::Local => "http://localhost:11434/v1",
        ProviderType::DeepL => "https://api-free.deepl.com",
        ProviderType::Google => "https://translation.googleapis.com/language/translate/v2",
        ProviderType::DeepLX => "http://localhost:1188/translate",
        ProviderType::LibreTranslate => "http://localhost:5000",
        ProviderType::Raw => "",
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_price_unit() -> String {
    "USD".to_string()
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("nodeweave")
}

fn default_cache_dir() -> PathBuf {
    app_dir(dirs::cache_dir()).join("translations")
}

fn default_session_dir() -> PathBuf {
    app_dir(dirs::data_local_dir()).join("sessions")
}

fn default_local_model() -> &'static str {
    "llama3.2"
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("local", ProviderType::Local),
        ProviderConfig::new("openai", ProviderType::OpenAI),
        ProviderConfig::new("deepl", ProviderType::DeepL),
        ProviderConfig::new("google", ProviderType::Google),
        ProviderConfig::new("deeplx", ProviderType::DeepLX),
        ProviderConfig::new("libretranslate", ProviderType::LibreTranslate),
        ProviderConfig::new("raw", ProviderType::Raw),
    ]
}

fn default_step_sets() -> Vec<StepSet> {
    vec![
        StepSet::three_stage("quality", "local", default_local_model(), 300),
        StepSet::translate_only("fast", "local", default_local_model()),
    ]
}

fn default_active_step_set() -> String {
    "quality".to_string()
}

impl Config {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `path`, writing the defaults there first when it does not exist.
    ///
    /// Returns the config and whether it was created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }
        let config = Self::default();
        config.save(path)?;
        Ok((config, true))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        FileManager::write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn step_set(&self, id: &str) -> Option<&StepSet> {
        self.step_sets.iter().find(|s| s.id == id)
    }

    /// The step set selected by `active_step_set`
    pub fn active_step_set(&self) -> Result<&StepSet, ValidationError> {
        self.step_set(&self.active_step_set)
            .ok_or_else(|| ValidationError::UnknownStepSet(self.active_step_set.clone()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ValidationError> {
        language_utils::validate_source_language(&self.source_language)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        language_utils::validate_language_code(&self.target_language)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(ValidationError::InvalidConfig(format!(
                "source and target language are both '{}'",
                self.target_language
            )));
        }

        if self.engine.concurrency == 0 {
            return Err(ValidationError::InvalidConfig(
                "engine.concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidConfig(
                "engine.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ValidationError::InvalidConfig(
                    "provider name must not be empty".to_string(),
                ));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(ValidationError::InvalidConfig(format!(
                    "provider '{}' is configured twice",
                    provider.name
                )));
            }
            let endpoint = provider.resolved_endpoint();
            if !endpoint.is_empty() {
                url::Url::parse(&endpoint).map_err(|e| {
                    ValidationError::InvalidConfig(format!(
                        "provider '{}' has an invalid endpoint '{}': {}",
                        provider.name, endpoint, e
                    ))
                })?;
            }
        }

        let step_set = self.active_step_set()?;
        step_set.validate()?;
        for (index, step) in step_set.steps.iter().enumerate() {
            let provider = self
                .provider(&step.provider)
                .ok_or_else(|| ValidationError::UnknownProvider(step.provider.clone()))?;

            if index > 0 && !provider.provider_type.follows_instructions() {
                return Err(ValidationError::InvalidStepSet {
                    id: step_set.id.clone(),
                    reason: format!(
                        "step {} uses {} provider '{}', which cannot follow reflection or improvement prompts",
                        index,
                        provider.provider_type.display_name(),
                        provider.name
                    ),
                });
            }

            if provider.provider_type.requires_api_key() && provider.api_key.trim().is_empty() {
                return Err(ValidationError::InvalidConfig(format!(
                    "an API key is required for {} provider '{}'",
                    provider.provider_type.display_name(),
                    provider.name
                )));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            engine: EngineOptions::default(),
            providers: default_providers(),
            step_sets: default_step_sets(),
            active_step_set: default_active_step_set(),
            log_level: LogLevel::default(),
        }
    }
}
