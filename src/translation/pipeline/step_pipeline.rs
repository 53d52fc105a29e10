/*!
 * Runs one node through the stages of the active step set.
 *
 * Each stage first consults the cache under its own key, calls the stage's
 * provider on a miss and stores the result. Any stage failure aborts the
 * attempt and is returned to the scheduler, which owns retries.
 */

use std::sync::Arc;
use std::time::Instant;

use crate::errors::{ProviderError, TranslationError, ValidationError};
use crate::logging::{LogFacadeLogger, SharedLogger};
use crate::node::Node;
use crate::providers::{CompletionRequest, ProviderRegistry};
use crate::translation::cache::{CacheKey, TranslationCache};
use crate::translation::prompts::{StageInput, StagePromptBuilder};
use crate::translation::steps::{StageKind, StepConfig, StepSet};
use crate::translation::usage::UsageTracker;

use super::attempt::AttemptState;

/// Outcome of one successful attempt
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTranslation {
    /// Final translation
    pub text: String,
    /// Stages executed (cache hits included)
    pub stages_run: usize,
    /// Stages answered by a provider rather than the cache
    pub provider_calls: usize,
    /// Whether stages after the first were skipped
    pub fast_mode: bool,
}

/// Stage runner shared by all workers of a run
pub struct StepPipeline {
    step_set: StepSet,
    providers: ProviderRegistry,
    cache: Option<Arc<dyn TranslationCache>>,
    source_language: String,
    target_language: String,
    force_refresh: bool,
    prompts: StagePromptBuilder,
    usage: Arc<UsageTracker>,
    logger: SharedLogger,
}

impl StepPipeline {
    pub fn new(
        step_set: StepSet,
        providers: ProviderRegistry,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        Self {
            step_set,
            providers,
            cache: None,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            force_refresh: false,
            prompts: StagePromptBuilder::new(source_language, target_language),
            usage: Arc::new(UsageTracker::new()),
            logger: LogFacadeLogger::shared(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn TranslationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skip cache lookups; results are still stored
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn step_set(&self) -> &StepSet {
        &self.step_set
    }

    pub fn usage(&self) -> Arc<UsageTracker> {
        Arc::clone(&self.usage)
    }

    /// Check that every step references a registered provider
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.step_set.validate()?;
        for step in &self.step_set.steps {
            self.providers.get(&step.provider)?;
        }
        Ok(())
    }

    /// Run one attempt for `node`
    pub async fn run(&self, node: &Node) -> Result<NodeTranslation, TranslationError> {
        if !node.is_translatable() {
            return Err(ValidationError::EmptyNode(node.id).into());
        }

        let planned = self.step_set.planned_stages(node.character_count);
        let fast_mode = planned < self.step_set.steps.len();
        if fast_mode {
            self.logger.debug(&format!(
                "Node {}: {} characters, fast mode runs {} of {} stages",
                node.id,
                node.character_count,
                planned,
                self.step_set.steps.len()
            ));
        }

        let mut working = String::new();
        let mut critique = String::new();
        let mut provider_calls = 0;
        let mut state = AttemptState::Pending.advance(planned);

        while let Some(index) = state.stage() {
            let step = &self.step_set.steps[index];
            let kind = StageKind::for_index(index);
            let key = CacheKey::compute(
                &node.content,
                &self.source_language,
                &self.target_language,
                &self.step_set.stage_signature(index),
                index,
            );

            let output = match self.lookup(&key).await {
                Some(hit) => {
                    self.logger
                        .debug(&format!("Node {}: stage '{}' served from cache", node.id, step.name));
                    hit
                }
                None => {
                    let input = StageInput {
                        source_text: &node.content,
                        translation: &working,
                        critique: &critique,
                        additional_notes: &step.additional_notes,
                    };
                    let text = match self.call_stage(node, kind, step, &input).await {
                        Ok(text) => text,
                        Err(e) => {
                            state = state.fail();
                            self.logger.debug(&format!(
                                "Node {}: stage '{}' failed ({:?}): {}",
                                node.id, step.name, state, e
                            ));
                            return Err(e);
                        }
                    };
                    provider_calls += 1;
                    self.store(&key, &text).await;
                    text
                }
            };

            match kind {
                StageKind::Translate | StageKind::Improve => working = output,
                StageKind::Reflect => critique = output,
            }
            state = state.advance(planned);
        }

        Ok(NodeTranslation {
            text: working,
            stages_run: planned,
            provider_calls,
            fast_mode,
        })
    }

    async fn call_stage(
        &self,
        node: &Node,
        kind: StageKind,
        step: &StepConfig,
        input: &StageInput<'_>,
    ) -> Result<String, TranslationError> {
        let client = self.providers.get(&step.provider)?;
        let (system_prompt, prompt) = self.prompts.build(kind, input);
        let text = match kind {
            StageKind::Translate => node.content.clone(),
            StageKind::Reflect | StageKind::Improve => input.translation.to_string(),
        };

        let request = CompletionRequest {
            prompt,
            system_prompt: Some(system_prompt),
            text,
            model: step.model_name.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            max_tokens: step.max_tokens,
            temperature: step.temperature,
        };

        let started = Instant::now();
        let completion = client.complete(&request).await?;
        self.usage.record_call(client.as_ref(), &completion, started.elapsed());

        let output = completion.text.trim();
        if output.is_empty() {
            return Err(ProviderError::ParseError(format!(
                "{} returned an empty response for stage '{}'",
                client.name(),
                step.name
            ))
            .into());
        }
        Ok(output.to_string())
    }

    /// Cache lookup; errors count as a miss
    async fn lookup(&self, key: &CacheKey) -> Option<String> {
        if self.force_refresh {
            return None;
        }
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(value)) => {
                self.usage.record_cache_hit();
                Some(value)
            }
            Ok(None) => {
                self.usage.record_cache_miss();
                None
            }
            Err(e) => {
                self.usage.record_cache_miss();
                self.logger.warn(&format!("Cache read failed, treating as miss: {}", e));
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, value: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(key, value).await {
                self.logger.warn(&format!("Cache write failed for {}: {}", key, e));
            }
        }
    }
}
