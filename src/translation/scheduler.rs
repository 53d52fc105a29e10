/*!
 * Bounded-concurrency scheduler for node translation.
 *
 * Nodes are pulled from the work list by at most `concurrency` workers. A
 * worker owns its node end to end: it runs the step pipeline, retries
 * retryable failures in place after a backoff, and reports each status change
 * to the session store. Node failures never abort the run.
 */

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::EngineOptions;
use crate::errors::DocumentError;
use crate::logging::{LogFacadeLogger, SharedLogger};
use crate::node::{ensure_unique_ids, Node, NodeId, NodeStatus};
use crate::session::{NodeUpdate, SessionStore};

use super::pipeline::StepPipeline;
use super::retry::RetryPolicy;
use super::usage::TokenUsageStats;

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new nodes; in-flight nodes finish their attempt
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    /// `completed / total * 100`
    pub progress: f64,
    pub duration: Duration,
    /// Final text of every successful node, resumed ones included
    pub translations: HashMap<NodeId, String>,
    /// Nodes skipped because an earlier run already translated them
    pub resumed_nodes: usize,
    pub cancelled: bool,
    pub usage: TokenUsageStats,
}

impl RunReport {
    /// Nodes neither translated nor failed (only after cancellation)
    pub fn pending_nodes(&self) -> usize {
        self.total_nodes - self.completed_nodes - self.failed_nodes
    }
}

/// Dispatches nodes to the step pipeline
pub struct Scheduler {
    pipeline: Arc<StepPipeline>,
    concurrency: usize,
    retry: RetryPolicy,
    session: Option<(Arc<SessionStore>, String)>,
    cancel: CancelHandle,
    logger: SharedLogger,
}

impl Scheduler {
    pub fn new(pipeline: Arc<StepPipeline>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
            retry,
            session: None,
            cancel: CancelHandle::new(),
            logger: LogFacadeLogger::shared(),
        }
    }

    pub fn from_options(pipeline: Arc<StepPipeline>, options: &EngineOptions) -> Self {
        Self::new(pipeline, options.concurrency, RetryPolicy::from_options(options))
    }

    /// Report node progress to `session_id` in `store`
    pub fn with_session(mut self, store: Arc<SessionStore>, session_id: &str) -> Self {
        self.session = Some((store, session_id.to_string()));
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Translate `nodes`. Nodes whose id is in `resumed` are taken as already
    /// translated and never dispatched.
    ///
    /// Fails before dispatch when the node list is empty or has duplicate ids.
    pub async fn run(
        &self,
        mut nodes: Vec<Node>,
        resumed: &HashMap<NodeId, String>,
    ) -> Result<RunReport, DocumentError> {
        if nodes.is_empty() {
            return Err(DocumentError::NoNodes("input".to_string()));
        }
        ensure_unique_ids(&nodes)?;

        let started = Instant::now();
        let total_nodes = nodes.len();
        let mut resumed_nodes = 0;
        for node in nodes.iter_mut() {
            if let Some(translation) = resumed.get(&node.id) {
                if node.restore(translation.clone()).is_ok() {
                    resumed_nodes += 1;
                }
            }
        }

        let (done, work): (Vec<Node>, Vec<Node>) =
            nodes.into_iter().partition(|n| n.status.is_terminal());
        self.logger.info(&format!(
            "Dispatching {} of {} nodes ({} resumed) with {} workers",
            work.len(),
            total_nodes,
            resumed_nodes,
            self.concurrency
        ));

        let finished: Vec<Node> = stream::iter(work)
            .map(|node| self.process(node))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut translations = HashMap::with_capacity(total_nodes);
        let mut completed_nodes = 0;
        let mut failed_nodes = 0;
        for node in done.into_iter().chain(finished) {
            match node.status {
                NodeStatus::Success => {
                    completed_nodes += 1;
                    if let Some(text) = node.translated_content {
                        translations.insert(node.id, text);
                    }
                }
                NodeStatus::Failed => failed_nodes += 1,
                NodeStatus::Pending | NodeStatus::InProgress => {}
            }
        }

        let report = RunReport {
            total_nodes,
            completed_nodes,
            failed_nodes,
            progress: completed_nodes as f64 / total_nodes as f64 * 100.0,
            duration: started.elapsed(),
            translations,
            resumed_nodes,
            cancelled: self.cancel.is_cancelled(),
            usage: self.pipeline.usage().snapshot(),
        };
        self.logger.info(&format!(
            "Run finished: {}/{} translated, {} failed, {:.1}% in {:.2}s",
            report.completed_nodes,
            report.total_nodes,
            report.failed_nodes,
            report.progress,
            report.duration.as_secs_f64()
        ));
        Ok(report)
    }

    /// Work one node until it is terminal or cancellation stops it
    async fn process(&self, mut node: Node) -> Node {
        let max_attempts = self.retry.max_attempts();
        loop {
            if self.cancel.is_cancelled() {
                self.logger
                    .debug(&format!("Node {}: not dispatched, run cancelled", node.id));
                return node;
            }

            let attempt = match node.begin_attempt(max_attempts) {
                Ok(attempt) => attempt,
                Err(e) => {
                    self.logger.error(&e.to_string());
                    return node;
                }
            };
            self.report(&node).await;

            let error = match self.pipeline.run(&node).await {
                Ok(result) => {
                    if let Err(e) = node.complete(result.text) {
                        self.logger.error(&e.to_string());
                    }
                    self.report(&node).await;
                    return node;
                }
                Err(e) => e,
            };

            if error.is_retryable() && self.retry.allows_retry(node.attempts) {
                let delay = self.retry.delay(attempt);
                self.logger.warn(&format!(
                    "Node {}: attempt {}/{} failed, retrying in {}ms: {}",
                    node.id,
                    attempt,
                    max_attempts,
                    delay.as_millis(),
                    error
                ));
                if let Err(e) = node.requeue(error.to_string()) {
                    self.logger.error(&e.to_string());
                    return node;
                }
                self.report(&node).await;
                tokio::time::sleep(delay).await;
                continue;
            }

            self.logger.error(&format!(
                "Node {}: failed after {} attempt(s): {}",
                node.id, attempt, error
            ));
            if let Err(e) = node.fail(error.to_string()) {
                self.logger.error(&e.to_string());
            }
            self.report(&node).await;
            if let Some((store, session_id)) = &self.session {
                if let Err(e) = store
                    .record_error(session_id, Some(node.id), &error.to_string())
                    .await
                {
                    self.logger.warn(&format!("Could not record node error: {}", e));
                }
            }
            return node;
        }
    }

    async fn report(&self, node: &Node) {
        let Some((store, session_id)) = &self.session else {
            return;
        };
        let mut update = NodeUpdate::new(node.id, node.status, node.character_count);
        if let Some(error) = &node.error {
            update = update.with_error(error.clone());
        }
        if node.status == NodeStatus::Success {
            if let Some(text) = &node.translated_content {
                update = update
                    .with_translation(text.clone())
                    .with_content_hash(node.content_hash());
            }
        }
        if let Err(e) = store.update_node_progress(session_id, update).await {
            self.logger
                .warn(&format!("Could not report progress of node {}: {}", node.id, e));
        }
    }
}
