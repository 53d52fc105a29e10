/*!
 * Prompt construction for pipeline stages.
 *
 * This module provides:
 * - Templates for the translate, reflect and improve stages
 * - A builder that renders them for a language pair
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, StageInput, StagePromptBuilder};
