/*!
 * Step sets: ordered stage configurations applied to every node.
 *
 * A step set runs `translate → reflect → improve` in its three-stage form.
 * Longer step sets alternate further reflect/improve rounds, a single-step
 * set only translates. Short nodes skip everything after the first stage
 * when they fall below the step set's fast-mode threshold.
 */

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// One stage of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    /// Display name of the stage
    pub name: String,

    /// Name of the configured provider serving this stage
    pub provider: String,

    /// Model requested from the provider
    #[serde(default)]
    pub model_name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Free-text instruction appended to the prompt
    #[serde(default)]
    pub additional_notes: String,
}

impl StepConfig {
    pub fn new(name: &str, provider: &str, model_name: &str) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            model_name: model_name.to_string(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            additional_notes: String::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.additional_notes = notes.to_string();
        self
    }

    /// Canonical text of every field that influences the stage output
    fn signature_part(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{:.3}\u{1f}{}\u{1f}{}",
            self.name,
            self.provider,
            self.model_name,
            self.temperature,
            self.max_tokens,
            self.additional_notes
        )
    }
}

/// What a stage does with its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Produce the working translation from the source
    Translate,
    /// Critique the working translation
    Reflect,
    /// Rewrite the working translation using the critique
    Improve,
}

impl StageKind {
    /// Kind of the stage at `index`: translate first, then reflect/improve pairs
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => Self::Translate,
            i if i % 2 == 1 => Self::Reflect,
            _ => Self::Improve,
        }
    }
}

/// Fast mode applies when the node is shorter than the threshold.
///
/// A threshold of zero disables fast mode.
pub fn is_fast_mode(character_count: usize, fast_mode_threshold: usize) -> bool {
    fast_mode_threshold > 0 && character_count < fast_mode_threshold
}

/// Ordered, named sequence of stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub fast_mode_threshold: usize,
}

impl StepSet {
    /// Classic translate → reflect → improve set served by one provider
    pub fn three_stage(id: &str, provider: &str, model_name: &str, fast_mode_threshold: usize) -> Self {
        Self {
            id: id.to_string(),
            name: "Translate, reflect, improve".to_string(),
            description: "Initial translation followed by a critique and a revision".to_string(),
            steps: vec![
                StepConfig::new("initial_translation", provider, model_name).with_temperature(0.3),
                StepConfig::new("reflection", provider, model_name).with_temperature(0.1),
                StepConfig::new("improvement", provider, model_name).with_temperature(0.3),
            ],
            fast_mode_threshold,
        }
    }

    /// Single-stage set
    pub fn translate_only(id: &str, provider: &str, model_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Translate only".to_string(),
            description: "One translation call per node".to_string(),
            steps: vec![StepConfig::new("initial_translation", provider, model_name)],
            fast_mode_threshold: 0,
        }
    }

    /// Number of stages a node of this length runs through
    pub fn planned_stages(&self, character_count: usize) -> usize {
        if is_fast_mode(character_count, self.fast_mode_threshold) {
            self.steps.len().min(1)
        } else {
            self.steps.len()
        }
    }

    /// Signature of stages `0..=stage_index`.
    ///
    /// A stage's output only depends on its own configuration and the stages
    /// before it, so editing a later stage leaves earlier cache keys intact.
    pub fn stage_signature(&self, stage_index: usize) -> String {
        self.steps
            .iter()
            .take(stage_index + 1)
            .map(StepConfig::signature_part)
            .collect::<Vec<_>>()
            .join("\u{1e}")
    }

    /// Signature of the whole set
    pub fn signature(&self) -> String {
        self.stage_signature(self.steps.len().saturating_sub(1))
    }

    /// Structural checks independent of the provider registry
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidStepSet {
            id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("at least one step is required".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.provider.trim().is_empty() {
                return Err(invalid(format!("step {} has no provider", index)));
            }
            if !(0.0..=2.0).contains(&step.temperature) {
                return Err(invalid(format!(
                    "step {} temperature {} is outside 0.0..=2.0",
                    index, step.temperature
                )));
            }
            if step.max_tokens == 0 {
                return Err(invalid(format!("step {} has max_tokens = 0", index)));
            }
        }
        Ok(())
    }
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}
