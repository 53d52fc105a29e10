/*!
 * Common test utilities for the nodeweave test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use nodeweave::app_config::Config;
use nodeweave::app_controller::Controller;
use nodeweave::logging::CaptureLogger;
use nodeweave::node::{Node, NodeId};
use nodeweave::providers::ProviderRegistry;
use nodeweave::session::SessionStore;
use nodeweave::translation::{StepSet, TranslationCache};

// Re-export the mock providers module
pub mod mock_providers;

/// Install a test logger once; later calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample plain-text document with three paragraphs and a code block
pub fn create_test_document(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = "The first paragraph.\n\n\
                   ```\nlet untouched = true;\n```\n\n\
                   The second paragraph\nspans two lines.\n\n\
                   The third paragraph.\n";
    create_test_file(dir, filename, content)
}

/// Nodes with ids 1..=n in order
pub fn nodes(contents: &[&str]) -> Vec<Node> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| Node::new(i as NodeId + 1, *content))
        .collect()
}

/// Text of exactly `len` characters
pub fn text_of_len(len: usize) -> String {
    "abcdefghij".chars().cycle().take(len).collect()
}

/// Config whose only step set is `step_set`, with millisecond backoff
pub fn test_config(step_set: StepSet, retry_attempts: u32) -> Config {
    let mut config = Config::default();
    config.active_step_set = step_set.id.clone();
    config.step_sets = vec![step_set];
    config.engine.retry_attempts = retry_attempts;
    config.engine.retry_backoff_ms = 1;
    config.engine.max_backoff_ms = 4;
    config
}

/// Controller over `registry` with sessions under `dir`
pub fn test_controller(
    dir: &Path,
    config: Config,
    registry: ProviderRegistry,
    cache: Option<Arc<dyn TranslationCache>>,
) -> Result<(Controller, Arc<CaptureLogger>)> {
    let logger = Arc::new(CaptureLogger::new());
    let sessions = SessionStore::open(dir.join("sessions"))?.with_logger(logger.clone());
    let controller =
        Controller::with_parts(config, registry, cache, Arc::new(sessions), logger.clone())?;
    Ok((controller, logger))
}
