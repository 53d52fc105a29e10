/*!
 * Translation engine for node-based documents.
 *
 * This module contains the orchestration core. It is split into several
 * submodules:
 *
 * - `steps`: step configuration, step sets and the fast-mode rule
 * - `prompts`: prompt templates for the translate, reflect and improve stages
 * - `cache`: content-addressed stage cache (in memory or on disk)
 * - `pipeline`: per-node stage runner and its attempt state machine
 * - `retry`: retry budget and exponential backoff
 * - `scheduler`: bounded worker pool over the node list
 * - `usage`: token and cost accounting
 */

// Re-export main types for easier usage
pub use self::cache::{CacheKey, CacheStats, FileCache, MemoryCache, TranslationCache};
pub use self::pipeline::{AttemptState, NodeTranslation, StepPipeline};
pub use self::prompts::{PromptTemplate, StagePromptBuilder};
pub use self::retry::RetryPolicy;
pub use self::scheduler::{CancelHandle, RunReport, Scheduler};
pub use self::steps::{StageKind, StepConfig, StepSet};
pub use self::usage::{TokenUsageStats, UsageTracker};

// Submodules
pub mod cache;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod scheduler;
pub mod steps;
pub mod usage;
