/*!
 * Error types for the nodeweave engine.
 *
 * The taxonomy follows the failure domains of a translation run:
 * - `ProviderError`: transient backend failures, retried by the scheduler
 * - `ValidationError`: malformed input or limits exceeded, fatal for one node
 * - `CacheError`: cache backend failures, degraded to a cache miss
 * - `PersistenceError`: session store failures, logged while the run continues
 * - `DocumentError`: failures that abort a run before any node is dispatched
 */

use std::path::PathBuf;
use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not finish before the configured deadline
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching error variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than 408/429 and authentication failures will
    /// fail the same way on every attempt, so they are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) => false,
            Self::ApiError { status_code, .. } => {
                !(400..500).contains(status_code) || *status_code == 408
            }
            _ => true,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors caused by malformed input or configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Node has no translatable content
    #[error("Node {0} has no translatable content")]
    EmptyNode(NodeId),

    /// A step references a provider that is not configured
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The requested step set does not exist
    #[error("Unknown step set: {0}")]
    UnknownStepSet(String),

    /// Step set has no steps or an invalid step
    #[error("Invalid step set '{id}': {reason}")]
    InvalidStepSet {
        /// Step set identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Prompt exceeds the provider's input token limit
    #[error("Input of ~{estimated} tokens exceeds the {limit} token limit of provider '{provider}'")]
    InputTooLarge {
        /// Provider name
        provider: String,
        /// Estimated input tokens
        estimated: u32,
        /// Provider limit
        limit: u32,
    },

    /// Requested completion size exceeds the provider's output limit
    #[error("Requested {requested} output tokens exceed the {limit} token limit of provider '{provider}'")]
    OutputTooLarge {
        /// Provider name
        provider: String,
        /// Requested output tokens
        requested: u32,
        /// Provider limit
        limit: u32,
    },

    /// Any other invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from the cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing a cache entry failed
    #[error("Cache I/O error at {path:?}: {source}")]
    Io {
        /// Entry or directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A blocking cache task could not be joined
    #[error("Cache task failed: {0}")]
    Task(String),
}

/// Errors from the session store's durable backend
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No session with this id is tracked or persisted
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Reading or writing a session file failed
    #[error("Session I/O error at {path:?}: {source}")]
    Io {
        /// Session file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Session JSON could not be encoded or decoded
    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking persistence task could not be joined
    #[error("Persistence task failed: {0}")]
    Task(String),
}

/// Errors that abort a whole document run
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The input document could not be read
    #[error("Cannot read document {path:?}: {source}")]
    Read {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The translated document could not be written
    #[error("Cannot write document {path:?}: {source}")]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document yielded nothing to translate
    #[error("Document '{0}' contains no translatable nodes")]
    NoNodes(String),

    /// Two nodes share the same id
    #[error("Duplicate node id {0} in document")]
    DuplicateNodeId(NodeId),

    /// A resumed session was recorded for a different node set
    #[error("Session '{session_id}' tracks {expected} nodes but the document has {actual}")]
    SessionMismatch {
        /// Session identifier
        session_id: String,
        /// Node count stored in the session
        expected: usize,
        /// Node count of the current document
        actual: usize,
    },
}

/// Node-level errors surfaced by the step pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Node or request failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl TranslationError {
    /// Whether the scheduler may retry the node after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Validation(_) => false,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error from the document layer
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from the session store
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Error from the cache
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
