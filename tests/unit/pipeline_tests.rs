/*!
 * Tests for the step pipeline across providers
 */

use std::sync::Arc;

use nodeweave::node::Node;
use nodeweave::providers::{ProviderRegistry, ProviderType};
use nodeweave::providers::mock::MockProvider;
use nodeweave::translation::{StepPipeline, StepSet};

fn hybrid_step_set() -> StepSet {
    let mut step_set = StepSet::three_stage("hybrid", "llm", "m", 0);
    step_set.steps[0].provider = "mt".to_string();
    step_set.steps[0] = step_set.steps[0].clone().with_notes("Keep it formal");
    step_set
}

#[tokio::test]
async fn test_run_withMachineTranslationFirstStage_shouldRouteStagesByProvider() {
    let mt = MockProvider::working().named("mt").with_type(ProviderType::DeepL);
    let llm = MockProvider::working().named("llm");
    let registry = ProviderRegistry::new()
        .with_client("mt", Arc::new(mt.clone()))
        .with_client("llm", Arc::new(llm.clone()));
    let pipeline = StepPipeline::new(hybrid_step_set(), registry, "en", "fr");
    assert!(pipeline.validate().is_ok());

    let result = pipeline.run(&Node::new(1, "Hello")).await.unwrap();

    assert_eq!(mt.call_count(), 1);
    assert_eq!(llm.call_count(), 2);
    assert_eq!(mt.requests()[0].text, "Hello");
    assert_eq!(result.text, "[fr] [fr] Hello");
    assert_eq!(result.provider_calls, 3);
}

#[tokio::test]
async fn test_run_shouldBuildPromptsWithLanguageNamesAndNotes() {
    let mt = MockProvider::working().named("mt");
    let llm = MockProvider::working().named("llm");
    let registry = ProviderRegistry::new()
        .with_client("mt", Arc::new(mt.clone()))
        .with_client("llm", Arc::new(llm.clone()));
    let pipeline = StepPipeline::new(hybrid_step_set(), registry, "en", "fr");

    pipeline.run(&Node::new(1, "Hello")).await.unwrap();

    let first = &mt.requests()[0];
    let system = first.system_prompt.as_deref().unwrap_or_default();
    assert!(system.contains("English"));
    assert!(system.contains("French"));
    assert!(first.prompt.contains("Additional instructions: Keep it formal"));
    assert!(first.prompt.contains("<SOURCE_TEXT>\nHello\n</SOURCE_TEXT>"));

    // Notes belong to the first step only
    let reflect = &llm.requests()[0];
    assert!(!reflect.prompt.contains("Keep it formal"));
    assert!(reflect.prompt.contains("<TRANSLATION>\n[fr] Hello\n</TRANSLATION>"));
}

#[tokio::test]
async fn test_run_withPricedProvider_shouldAccumulateCost() {
    let provider = MockProvider::working().with_prices(2.0, 4.0);
    let registry = ProviderRegistry::new().with_client("mock", Arc::new(provider.clone()));
    let pipeline = StepPipeline::new(StepSet::translate_only("fast", "mock", "m"), registry, "en", "de");

    pipeline.run(&Node::new(1, "Hello there")).await.unwrap();
    pipeline.run(&Node::new(2, "General Kenobi")).await.unwrap();

    let usage = pipeline.usage().snapshot();
    assert_eq!(usage.provider_calls, 2);
    assert!(usage.input_tokens > 0);
    assert_eq!(usage.total_tokens, usage.input_tokens + usage.output_tokens);
    assert!(usage.estimated_cost > 0.0);
    assert_eq!(usage.price_unit, "USD");
}
