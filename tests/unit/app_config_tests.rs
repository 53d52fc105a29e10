/*!
 * Tests for application configuration
 */

use nodeweave::app_config::{Config, ProviderConfig};
use nodeweave::errors::ValidationError;
use nodeweave::providers::ProviderType;

use crate::common::{create_temp_dir, create_test_file};

/// A hand-written config file in the documented layout
const CUSTOM_CONFIG: &str = r#"{
    "source_language": "auto",
    "target_language": "de",
    "engine": { "concurrency": 8, "retry_attempts": 1 },
    "providers": [
        { "name": "mt", "type": "deeplx", "endpoint": "http://localhost:1188/translate" },
        { "name": "llm", "type": "local", "maxOutputTokens": 2048 }
    ],
    "step_sets": [
        {
            "id": "hybrid",
            "name": "Hybrid",
            "description": "MT draft refined by a local model",
            "steps": [
                { "name": "draft", "provider": "mt" },
                { "name": "review", "provider": "llm", "modelName": "qwen2.5", "temperature": 0.2 },
                { "name": "polish", "provider": "llm", "modelName": "qwen2.5", "additionalNotes": "Keep it formal." }
            ],
            "fastModeThreshold": 200
        }
    ],
    "active_step_set": "hybrid",
    "log_level": "debug"
}"#;

#[test]
fn test_load_withCustomFile_shouldParseEveryLayer() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "conf.json", CUSTOM_CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.engine.concurrency, 8);
    assert_eq!(config.engine.retry_backoff_ms, 1000);

    let step_set = config.active_step_set().unwrap();
    assert_eq!(step_set.steps.len(), 3);
    assert_eq!(step_set.fast_mode_threshold, 200);
    assert_eq!(step_set.steps[2].additional_notes, "Keep it formal.");

    let llm = config.provider("llm").unwrap();
    assert_eq!(llm.provider_type, ProviderType::Local);
    assert_eq!(llm.max_output_tokens, 2048);
}

#[test]
fn test_validate_withUnknownStepProvider_shouldNameIt() {
    let mut config: Config = serde_json::from_str(CUSTOM_CONFIG).unwrap();
    config.providers.retain(|p| p.name != "llm");

    assert_eq!(
        config.validate().unwrap_err(),
        ValidationError::UnknownProvider("llm".to_string())
    );
}

#[test]
fn test_validate_withDuplicateProviderNames_shouldFail() {
    let mut config = Config::default();
    config.providers.push(ProviderConfig::new("local", ProviderType::Raw));
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroConcurrency_shouldFail() {
    let mut config = Config::default();
    config.engine.concurrency = 0;
    assert!(matches!(config.validate(), Err(ValidationError::InvalidConfig(_))));
}

#[test]
fn test_validate_withInvalidTargetLanguage_shouldFail() {
    let mut config = Config::default();
    config.target_language = "klingon".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_save_thenLoad_shouldRoundTripStepSets() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("conf.json");
    let config: Config = serde_json::from_str(CUSTOM_CONFIG).unwrap();

    config.save(&path).unwrap();
    let reloaded = Config::load(&path).unwrap();
    assert_eq!(reloaded.step_sets, config.step_sets);
    assert_eq!(reloaded.engine, config.engine);
}
