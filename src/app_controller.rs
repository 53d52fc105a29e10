use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::document::{DocumentProcessor, PlainTextProcessor};
use crate::errors::DocumentError;
use crate::file_utils::FileManager;
use crate::logging::{LogFacadeLogger, SharedLogger};
use crate::node::{ensure_unique_ids, Node, NodeId};
use crate::providers::ProviderRegistry;
use crate::session::SessionStore;
use crate::translation::{
    CancelHandle, FileCache, RunReport, Scheduler, StepPipeline, StepSet, TokenUsageStats,
    TranslationCache,
};

// @module: Application controller wiring the engine together

/// Outcome of translating one document
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub session_id: String,
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    /// 0 to 100
    pub progress: f64,
    pub duration: Duration,
    pub cancelled: bool,
    pub usage: TokenUsageStats,
}

impl TranslationResult {
    fn from_report(
        input_file: &Path,
        output_file: &Path,
        session_id: &str,
        report: RunReport,
    ) -> Self {
        Self {
            input_file: input_file.to_path_buf(),
            output_file: output_file.to_path_buf(),
            session_id: session_id.to_string(),
            total_nodes: report.total_nodes,
            completed_nodes: report.completed_nodes,
            failed_nodes: report.failed_nodes,
            progress: report.progress,
            duration: report.duration,
            cancelled: report.cancelled,
            usage: report.usage,
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{} -> {}: {}/{} nodes translated, {} failed ({:.1}%) in {}",
            self.input_file.display(),
            self.output_file.display(),
            self.completed_nodes,
            self.total_nodes,
            self.failed_nodes,
            self.progress,
            format_duration(self.duration)
        )
    }
}

/// Session id derived from the document and run parameters.
///
/// Rerunning the same file with the same languages and step set resumes the
/// same session.
pub fn default_session_id(
    content: &str,
    source_language: &str,
    target_language: &str,
    step_set: &StepSet,
) -> String {
    let signature = step_set.signature();
    let mut hasher = Sha256::new();
    for field in [content, source_language, target_language, signature.as_str()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

// Format duration in a human-readable format
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}

/// Main application controller: owns the engine context for a run
pub struct Controller {
    // @field: App configuration
    config: Config,
    step_set: StepSet,
    providers: ProviderRegistry,
    cache: Option<Arc<dyn TranslationCache>>,
    sessions: Arc<SessionStore>,
    cancel: CancelHandle,
    logger: SharedLogger,
}

impl Controller {
    // @method: Create a controller from configuration, building every client
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let logger = LogFacadeLogger::shared();
        let timeout = Duration::from_secs(config.engine.request_timeout_secs);
        let providers = ProviderRegistry::from_configs(&config.providers, timeout)
            .context("Failed to build provider clients")?;

        let cache: Option<Arc<dyn TranslationCache>> = if config.engine.cache_enabled {
            let cache = FileCache::open(&config.engine.cache_dir).with_context(|| {
                format!("Failed to open cache directory {:?}", config.engine.cache_dir)
            })?;
            Some(Arc::new(cache))
        } else {
            None
        };

        let sessions = SessionStore::open(&config.engine.session_dir)
            .with_context(|| {
                format!("Failed to open session directory {:?}", config.engine.session_dir)
            })?
            .with_logger(Arc::clone(&logger));

        Self::with_parts(config, providers, cache, Arc::new(sessions), logger)
    }

    // @method: Create a controller from prebuilt parts
    pub fn with_parts(
        config: Config,
        providers: ProviderRegistry,
        cache: Option<Arc<dyn TranslationCache>>,
        sessions: Arc<SessionStore>,
        logger: SharedLogger,
    ) -> Result<Self> {
        let step_set = config.active_step_set()?.clone();
        step_set.validate()?;
        for step in &step_set.steps {
            providers.get(&step.provider)?;
        }

        Ok(Self {
            config,
            step_set,
            providers,
            cache,
            sessions,
            cancel: CancelHandle::new(),
            logger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Handle that stops dispatch of new nodes in every later or running run
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn pipeline(&self) -> StepPipeline {
        let mut pipeline = StepPipeline::new(
            self.step_set.clone(),
            self.providers.clone(),
            &self.config.source_language,
            &self.config.target_language,
        )
        .with_force_refresh(self.config.engine.force_refresh)
        .with_logger(Arc::clone(&self.logger));
        if let Some(cache) = &self.cache {
            pipeline = pipeline.with_cache(Arc::clone(cache));
        }
        pipeline
    }

    /// Translate a node list under `session_id`, resuming it when persisted.
    ///
    /// Node-level failures are part of the report; only document-level
    /// problems return an error.
    pub async fn translate_nodes(
        &self,
        session_id: &str,
        file_name: &str,
        nodes: Vec<Node>,
    ) -> Result<RunReport, DocumentError> {
        if nodes.is_empty() {
            return Err(DocumentError::NoNodes(file_name.to_string()));
        }
        ensure_unique_ids(&nodes)?;

        let session = self
            .sessions
            .resume_or_start(session_id, file_name, &nodes)
            .await?;
        let resumed: HashMap<NodeId, String> = session.successful_translations();

        let scheduler = Scheduler::from_options(Arc::new(self.pipeline()), &self.config.engine)
            .with_session(Arc::clone(&self.sessions), session_id)
            .with_cancel_handle(self.cancel.clone())
            .with_logger(Arc::clone(&self.logger));

        let report = match scheduler.run(nodes, &resumed).await {
            Ok(report) => report,
            Err(e) => {
                if let Err(pe) = self.sessions.mark_failed(session_id, &e.to_string()).await {
                    self.logger.warn(&format!("Could not mark session failed: {}", pe));
                }
                self.sessions.stop_tracking(session_id).await;
                return Err(e);
            }
        };

        if report.cancelled && report.pending_nodes() > 0 {
            if let Err(e) = self.sessions.mark_cancelled(session_id).await {
                self.logger.warn(&format!("Could not mark session cancelled: {}", e));
            }
        }
        self.sessions.stop_tracking(session_id).await;
        Ok(report)
    }

    /// Translate a plain-text document and write the result.
    ///
    /// `output` defaults to `<stem>.<target>.<ext>` next to the input and
    /// `session_id` to a hash of the document and run parameters.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        session_id: Option<&str>,
    ) -> Result<TranslationResult> {
        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|source| DocumentError::Read {
                path: input.to_path_buf(),
                source,
            })?;

        let output_file = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let dir = input.parent().unwrap_or_else(|| Path::new("."));
                FileManager::generate_output_path(input, dir, &self.config.target_language)
            }
        };
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => default_session_id(
                &content,
                &self.config.source_language,
                &self.config.target_language,
                &self.step_set,
            ),
        };
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());

        let mut processor = PlainTextProcessor::new();
        let nodes = processor.extract(&content);
        self.logger.info(&format!(
            "Translating {} ({} nodes, session {}) with step set '{}'",
            file_name,
            nodes.len(),
            session_id,
            self.step_set.id
        ));

        let report = self.translate_nodes(&session_id, &file_name, nodes).await?;
        if report.failed_nodes > 0 {
            self.logger.warn(&format!(
                "{} node(s) failed and keep their original text",
                report.failed_nodes
            ));
        }

        let translated = processor.reassemble(&report.translations);
        FileManager::write_atomic(&output_file, translated.as_bytes()).map_err(|source| {
            DocumentError::Write {
                path: output_file.clone(),
                source,
            }
        })?;

        let result = TranslationResult::from_report(input, &output_file, &session_id, report);
        self.logger.info(&result.summary());
        self.logger.info(&result.usage.summary());
        Ok(result)
    }
}
