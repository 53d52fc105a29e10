/*!
 * Session records persisted by the session store.
 *
 * One `Session` is one JSON document on disk. Field names are camelCase so
 * the files stay readable by other tools.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::node::{NodeId, NodeStatus};

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    /// Get a human-readable status string
    pub fn display(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Per-node progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProgress {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub character_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Final translation, kept so a resumed run needs no provider call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
    /// Hash of the source text the translation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Error recorded against a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

/// Status change reported for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub character_count: usize,
    pub error: Option<String>,
    pub translated_content: Option<String>,
    pub content_hash: Option<String>,
}

impl NodeUpdate {
    pub fn new(node_id: NodeId, status: NodeStatus, character_count: usize) -> Self {
        Self {
            node_id,
            status,
            character_count,
            error: None,
            translated_content: None,
            content_hash: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translated_content = Some(translation.into());
        self
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }
}

/// Durable record of one document run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub file_name: String,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub total_nodes: usize,
    pub completed_nodes: usize,
    #[serde(default)]
    pub failed_nodes: usize,
    #[serde(default)]
    pub node_progress: BTreeMap<NodeId, NodeProgress>,
    #[serde(default)]
    pub errors: Vec<ErrorInfo>,
}

impl Session {
    pub fn new(id: &str, file_name: &str, total_nodes: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            file_name: file_name.to_string(),
            start_time: now,
            last_update_time: now,
            status: SessionStatus::Running,
            total_nodes,
            completed_nodes: 0,
            failed_nodes: 0,
            node_progress: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Advance `last_update_time`, never moving it backwards
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_update_time {
            self.last_update_time = now;
        }
    }

    /// Apply a node status change and recompute the counters
    pub fn apply(&mut self, update: NodeUpdate) {
        let now = Utc::now();
        let entry = self
            .node_progress
            .entry(update.node_id)
            .or_insert_with(|| NodeProgress {
                node_id: update.node_id,
                status: NodeStatus::Pending,
                start_time: None,
                complete_time: None,
                character_count: update.character_count,
                error: None,
                translated_content: None,
                content_hash: None,
            });

        entry.status = update.status;
        entry.character_count = update.character_count;
        match update.status {
            NodeStatus::InProgress => {
                if entry.start_time.is_none() {
                    entry.start_time = Some(now);
                }
            }
            NodeStatus::Success | NodeStatus::Failed => entry.complete_time = Some(now),
            NodeStatus::Pending => {}
        }
        if update.error.is_some() || update.status == NodeStatus::Success {
            entry.error = update.error;
        }
        if update.translated_content.is_some() {
            entry.translated_content = update.translated_content;
        }
        if update.content_hash.is_some() {
            entry.content_hash = update.content_hash;
        }

        self.recount();
        self.touch();
    }

    /// Derive the counters from the progress map, bounded by `total_nodes`
    fn recount(&mut self) {
        let count = |status: NodeStatus| {
            self.node_progress
                .values()
                .filter(|p| p.status == status)
                .count()
        };
        let completed = count(NodeStatus::Success).min(self.total_nodes);
        let failed = count(NodeStatus::Failed).min(self.total_nodes - completed);
        self.completed_nodes = completed;
        self.failed_nodes = failed;
    }

    pub fn record_error(&mut self, node_id: Option<NodeId>, message: impl Into<String>) {
        self.errors.push(ErrorInfo {
            timestamp: Utc::now(),
            node_id,
            message: message.into(),
        });
        self.touch();
    }

    /// Whether every node reached `Success` or `Failed`
    pub fn all_terminal(&self) -> bool {
        self.completed_nodes + self.failed_nodes >= self.total_nodes
    }

    /// Calculate completion percentage
    pub fn progress(&self) -> f64 {
        if self.total_nodes == 0 {
            return 0.0;
        }
        self.completed_nodes as f64 / self.total_nodes as f64 * 100.0
    }

    /// Node status as recorded, `Pending` when never reported
    pub fn node_status(&self, node_id: NodeId) -> NodeStatus {
        self.node_progress
            .get(&node_id)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    /// Translations of every node recorded as `Success`
    pub fn successful_translations(&self) -> HashMap<NodeId, String> {
        self.node_progress
            .values()
            .filter(|p| p.status == NodeStatus::Success)
            .filter_map(|p| p.translated_content.clone().map(|t| (p.node_id, t)))
            .collect()
    }

    /// Put nodes interrupted mid-attempt back to `Pending`
    pub fn reset_interrupted(&mut self) -> usize {
        let mut reset = 0;
        for progress in self.node_progress.values_mut() {
            let lost_translation =
                progress.status == NodeStatus::Success && progress.translated_content.is_none();
            if progress.status == NodeStatus::InProgress || lost_translation {
                progress.status = NodeStatus::Pending;
                reset += 1;
            }
        }
        self.recount();
        reset
    }

    /// Put successful nodes whose source text changed back to `Pending`.
    ///
    /// `hashes` maps every current node id to its `content_hash`. A record
    /// without a hash, or for an id no longer present, counts as changed.
    pub fn discard_changed(&mut self, hashes: &HashMap<NodeId, String>) -> usize {
        let mut discarded = 0;
        for progress in self.node_progress.values_mut() {
            if progress.status != NodeStatus::Success {
                continue;
            }
            let unchanged = progress
                .content_hash
                .as_ref()
                .is_some_and(|hash| hashes.get(&progress.node_id) == Some(hash));
            if !unchanged {
                progress.status = NodeStatus::Pending;
                progress.translated_content = None;
                progress.content_hash = None;
                progress.complete_time = None;
                discarded += 1;
            }
        }
        self.recount();
        discarded
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}/{} done, {} failed, {:.1}%, {})",
            self.id,
            self.file_name,
            self.completed_nodes,
            self.total_nodes,
            self.failed_nodes,
            self.progress(),
            self.status.display()
        )
    }
}
