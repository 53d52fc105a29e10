/*!
 * Tests for provider construction and the provider contract
 */

use std::time::Duration;

use nodeweave::app_config::{Config, ProviderConfig};
use nodeweave::errors::{TranslationError, ValidationError};
use nodeweave::providers::{CompletionRequest, ProviderRegistry, ProviderType, create_client};

#[test]
fn test_createClient_shouldBuildEveryConfiguredVariant() {
    let config = Config::default();
    let registry = ProviderRegistry::from_configs(&config.providers, Duration::from_secs(5)).unwrap();

    for provider in &config.providers {
        let client = registry.get(&provider.name).unwrap();
        assert_eq!(client.name(), provider.name);
        assert_eq!(client.provider_type(), provider.provider_type);
    }
}

#[test]
fn test_createClient_shouldCarryLimitsAndPrices() {
    let mut config = ProviderConfig::new("cloud", ProviderType::OpenAI);
    config.max_input_tokens = 1000;
    config.input_token_price = 2.5;

    let client = create_client(&config, Duration::from_secs(5)).unwrap();
    assert_eq!(client.max_input_tokens(), 1000);
    assert_eq!(client.input_token_price(), 2.5);
    assert_eq!(client.price_unit(), "USD");
}

#[test]
fn test_providerType_capabilities_shouldSeparateLlmsFromMachineTranslation() {
    assert!(ProviderType::OpenAI.follows_instructions());
    assert!(ProviderType::Local.follows_instructions());
    assert!(!ProviderType::DeepL.follows_instructions());
    assert!(!ProviderType::LibreTranslate.follows_instructions());
    assert!(!ProviderType::Local.requires_api_key());
    assert!(ProviderType::Google.requires_api_key());
}

#[tokio::test]
async fn test_rawClient_shouldEchoTextWithoutNetwork() {
    let client = create_client(&ProviderConfig::new("raw", ProviderType::Raw), Duration::from_secs(1)).unwrap();
    let request = CompletionRequest {
        text: "unchanged".to_string(),
        target_language: "fr".to_string(),
        ..Default::default()
    };

    let completion = client.complete(&request).await.unwrap();
    assert_eq!(completion.text, "unchanged");
}

#[tokio::test]
async fn test_machineTranslationClient_withOversizedText_shouldFailValidation() {
    let mut config = ProviderConfig::new("deepl", ProviderType::DeepL);
    config.api_key = "test".to_string();
    config.max_input_tokens = 2;
    let client = create_client(&config, Duration::from_secs(1)).unwrap();
    let request = CompletionRequest {
        text: "far more than eight characters".to_string(),
        target_language: "de".to_string(),
        ..Default::default()
    };

    let err = client.complete(&request).await.unwrap_err();
    assert!(matches!(
        err,
        TranslationError::Validation(ValidationError::InputTooLarge { limit: 2, .. })
    ));
    assert!(!err.is_retryable());
}
