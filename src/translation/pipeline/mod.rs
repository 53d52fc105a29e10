/*!
 * Multi-stage translation pipeline.
 *
 * Every node runs through the stages of the active step set:
 * 1. **Translate**: produce the working translation from the source
 * 2. **Reflect**: critique the working translation
 * 3. **Improve**: rewrite the working translation using the critique
 *
 * Nodes shorter than the fast-mode threshold only run the first stage.
 */

pub mod attempt;
pub mod step_pipeline;

pub use attempt::AttemptState;
pub use step_pipeline::{NodeTranslation, StepPipeline};
