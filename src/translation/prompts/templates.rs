/*!
 * Prompt templates for the three stage kinds.
 *
 * Templates use `{name}` placeholders. Language placeholders are filled
 * with English language names so the model sees "French", not "fr".
 */

use crate::language_utils;
use crate::translation::steps::StageKind;

/// Prompt template with `{placeholder}` variables.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// System prompt shared by every stage
    pub const SYSTEM: &'static str = "You are an expert translator working from {source_language} into {target_language}. \
Preserve markup, placeholders, code spans and line breaks exactly as they appear. \
Reply with the requested text only, without commentary.";

    /// Initial translation
    pub const TRANSLATE: &'static str = r#"Translate the following text from {source_language} to {target_language}.
{additional_notes}
<SOURCE_TEXT>
{source_text}
</SOURCE_TEXT>"#;

    /// Critique of a working translation
    pub const REFLECT: &'static str = r#"Review a translation from {source_language} to {target_language}.
List concrete suggestions to improve its accuracy, fluency, style and terminology. Do not rewrite the translation.
{additional_notes}
<SOURCE_TEXT>
{source_text}
</SOURCE_TEXT>

<TRANSLATION>
{translation}
</TRANSLATION>"#;

    /// Revision of a working translation using the critique
    pub const IMPROVE: &'static str = r#"Edit a translation from {source_language} to {target_language} using the expert suggestions below.
Output only the improved translation.
{additional_notes}
<SOURCE_TEXT>
{source_text}
</SOURCE_TEXT>

<TRANSLATION>
{translation}
</TRANSLATION>

<SUGGESTIONS>
{critique}
</SUGGESTIONS>"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Template for a stage kind
    pub fn for_stage(kind: StageKind) -> Self {
        match kind {
            StageKind::Translate => Self::new(Self::TRANSLATE),
            StageKind::Reflect => Self::new(Self::REFLECT),
            StageKind::Improve => Self::new(Self::IMPROVE),
        }
    }

    /// Replace every `{name}` with its value; unknown placeholders are left as is.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        vars.iter().fold(self.template.clone(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

/// Inputs of one stage prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct StageInput<'a> {
    pub source_text: &'a str,
    /// Working translation, empty for the first stage
    pub translation: &'a str,
    /// Latest critique, empty unless improving
    pub critique: &'a str,
    pub additional_notes: &'a str,
}

/// Builds system and user prompts for a language pair
#[derive(Debug, Clone)]
pub struct StagePromptBuilder {
    source_language: String,
    target_language: String,
}

impl StagePromptBuilder {
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: language_utils::display_name(source_language),
            target_language: language_utils::display_name(target_language),
        }
    }

    pub fn build_system_prompt(&self) -> String {
        PromptTemplate::new(PromptTemplate::SYSTEM).render(&[
            ("source_language", &self.source_language),
            ("target_language", &self.target_language),
        ])
    }

    pub fn build_user_prompt(&self, kind: StageKind, input: &StageInput<'_>) -> String {
        let notes = if input.additional_notes.trim().is_empty() {
            String::new()
        } else {
            format!("Additional instructions: {}\n", input.additional_notes.trim())
        };

        PromptTemplate::for_stage(kind).render(&[
            ("source_language", &self.source_language),
            ("target_language", &self.target_language),
            ("additional_notes", &notes),
            ("source_text", input.source_text),
            ("translation", input.translation),
            ("critique", input.critique),
        ])
    }

    /// Build both system and user prompts.
    pub fn build(&self, kind: StageKind, input: &StageInput<'_>) -> (String, String) {
        (self.build_system_prompt(), self.build_user_prompt(kind, input))
    }
}
