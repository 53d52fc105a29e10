/*!
 * Logger interface injected into engine components.
 *
 * Engine code never calls the `log` macros directly. Every component that
 * needs to report something receives a `SharedLogger` through its constructor:
 * - `LogFacadeLogger` forwards records to the `log` crate (used by the binary)
 * - `CaptureLogger` keeps records in memory (tests and embedding callers)
 */

use log::Level;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to an engine logger
pub type SharedLogger = Arc<dyn EngineLogger>;

/// Logging capability used by the engine
pub trait EngineLogger: Send + Sync {
    /// Record a message at the given level
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Forwards engine records to the `log` facade under a fixed target
#[derive(Debug, Clone)]
pub struct LogFacadeLogger {
    target: String,
}

impl LogFacadeLogger {
    /// Create a logger that emits under `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Shared handle with the crate name as target
    pub fn shared() -> SharedLogger {
        Arc::new(Self::new("nodeweave"))
    }
}

impl EngineLogger for LogFacadeLogger {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: &self.target, level, "{}", message);
    }
}

/// Captured log record
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct CaptureLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records captured so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Whether any record at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Number of records at `level`
    pub fn count(&self, level: Level) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }
}

impl EngineLogger for CaptureLogger {
    fn log(&self, level: Level, message: &str) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}
