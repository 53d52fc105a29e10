/*!
 * Node model: the unit of translation work.
 *
 * A document processor splits a document into nodes with unique ids. The
 * engine treats node content as opaque text and only looks at its length.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

use crate::errors::DocumentError;

/// Node identifier, unique within one document
pub type NodeId = u64;

/// Hex SHA-256 of node content.
///
/// Sessions record it so a resumed run can tell whether a node id still
/// refers to the same text.
pub fn content_hash(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Lifecycle status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Failed,
}

impl NodeStatus {
    /// Whether the node will not be worked on again in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Rejected status change
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Node {id}: cannot move from {from} to {to}")]
    Invalid {
        id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    },

    #[error("Node {id}: attempt limit of {limit} reached")]
    AttemptsExhausted { id: NodeId, limit: u32 },
}

/// An independently translatable unit extracted from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub content: String,
    pub status: NodeStatus,
    pub translated_content: Option<String>,
    pub character_count: usize,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    /// Attempts started so far; never decreases
    pub attempts: u32,
}

impl Node {
    /// Create a pending node
    pub fn new(id: NodeId, content: impl Into<String>) -> Self {
        let content = content.into();
        let character_count = content.chars().count();
        Self {
            id,
            content,
            status: NodeStatus::Pending,
            translated_content: None,
            character_count,
            error: None,
            start_time: None,
            complete_time: None,
            attempts: 0,
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// Whether the content has anything to translate
    pub fn is_translatable(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// `Pending → InProgress`, counting a new attempt bounded by `max_attempts`
    pub fn begin_attempt(&mut self, max_attempts: u32) -> Result<u32, TransitionError> {
        if self.status != NodeStatus::Pending {
            return Err(self.invalid(NodeStatus::InProgress));
        }
        if self.attempts >= max_attempts {
            return Err(TransitionError::AttemptsExhausted {
                id: self.id,
                limit: max_attempts,
            });
        }

        self.attempts += 1;
        self.status = NodeStatus::InProgress;
        self.error = None;
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
        }
        Ok(self.attempts)
    }

    /// `InProgress → Pending` after a retryable failure
    pub fn requeue(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != NodeStatus::InProgress {
            return Err(self.invalid(NodeStatus::Pending));
        }
        self.status = NodeStatus::Pending;
        self.error = Some(error.into());
        Ok(())
    }

    /// `InProgress → Success`
    pub fn complete(&mut self, translation: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != NodeStatus::InProgress {
            return Err(self.invalid(NodeStatus::Success));
        }
        self.status = NodeStatus::Success;
        self.translated_content = Some(translation.into());
        self.error = None;
        self.complete_time = Some(Utc::now());
        Ok(())
    }

    /// `InProgress → Failed`
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != NodeStatus::InProgress {
            return Err(self.invalid(NodeStatus::Failed));
        }
        self.status = NodeStatus::Failed;
        self.error = Some(error.into());
        self.complete_time = Some(Utc::now());
        Ok(())
    }

    /// `Pending → Success` for a node translated by an earlier run
    pub fn restore(&mut self, translation: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != NodeStatus::Pending {
            return Err(self.invalid(NodeStatus::Success));
        }
        self.status = NodeStatus::Success;
        self.translated_content = Some(translation.into());
        Ok(())
    }

    fn invalid(&self, to: NodeStatus) -> TransitionError {
        TransitionError::Invalid {
            id: self.id,
            from: self.status,
            to,
        }
    }
}

/// Reject node lists whose ids are not unique
pub fn ensure_unique_ids(nodes: &[Node]) -> Result<(), DocumentError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id) {
            return Err(DocumentError::DuplicateNodeId(node.id));
        }
    }
    Ok(())
}
