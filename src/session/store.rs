/*!
 * Session store for translation session lifecycle.
 *
 * This module handles:
 * - Creating and resuming sessions
 * - Recording node progress as workers report it
 * - Persisting one JSON file per session with atomic replace
 * - Session listing and cleanup
 *
 * Each session has its own state lock, so workers of different sessions
 * never contend. Node updates only change memory and schedule a flush; at
 * most one flush per session is pending and it waits out the flush
 * interval, so a burst of updates costs one disk write. Lifecycle changes
 * (start, resume, cancel, fail, stop) are written before returning.
 *
 * Every state change bumps a revision number. A write records the revision
 * it saved and later writes of an older or equal revision are skipped, so
 * the file never goes back in time. Write failures are logged and the
 * in-memory state stays authoritative.
 */

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::errors::{DocumentError, PersistenceError};
use crate::file_utils::FileManager;
use crate::logging::{LogFacadeLogger, SharedLogger};
use crate::node::{Node, NodeId};

use super::models::{NodeUpdate, Session, SessionStatus};

const SESSION_EXTENSION: &str = "json";

/// Minimum spacing between two coalesced writes of one session
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

struct SessionHandle {
    path: PathBuf,
    state: Mutex<Session>,
    /// Bumped under the state lock on every change
    revision: AtomicU64,
    /// Revision of the last snapshot on disk
    persisted: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
    flush_pending: AtomicBool,
    last_flush: Mutex<Instant>,
}

impl SessionHandle {
    fn new(session: Session, path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            state: Mutex::new(session),
            revision: AtomicU64::new(1),
            persisted: AtomicU64::new(0),
            write_lock: tokio::sync::Mutex::new(()),
            flush_pending: AtomicBool::new(false),
            last_flush: Mutex::new(Instant::now()),
        })
    }

    fn mutate<R>(&self, change: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.state.lock();
        let result = change(&mut session);
        self.revision.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Write the current state unless a write already covered it
    async fn write_snapshot(&self, writes: &AtomicU64) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let (revision, snapshot) = {
            let session = self.state.lock();
            (self.revision.load(Ordering::SeqCst), session.clone())
        };
        if revision <= self.persisted.load(Ordering::SeqCst) {
            return Ok(());
        }

        let json = serde_json::to_vec_pretty(&snapshot)?;
        let path = self.path.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || FileManager::write_atomic(&target, &json))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))?
            .map_err(|source| PersistenceError::Io { path, source })?;

        self.persisted.store(revision, Ordering::SeqCst);
        *self.last_flush.lock() = Instant::now();
        writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Tracks active sessions and persists them under a directory
pub struct SessionStore {
    dir: PathBuf,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    logger: SharedLogger,
    flush_interval: Duration,
    writes: Arc<AtomicU64>,
}

impl SessionStore {
    /// Open (and create) a session directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        FileManager::ensure_dir(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            sessions: Mutex::new(HashMap::new()),
            logger: LogFacadeLogger::shared(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            writes: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Spacing between coalesced writes of node updates
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session files written since the store was opened
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// File name for a session id; characters unsafe in paths are replaced
    fn session_path(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", safe, SESSION_EXTENSION))
    }

    fn handle(&self, session_id: &str) -> Result<Arc<SessionHandle>, PersistenceError> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PersistenceError::SessionNotFound(session_id.to_string()))
    }

    fn register(&self, session: Session) -> Arc<SessionHandle> {
        let handle = SessionHandle::new(session.clone(), self.session_path(&session.id));
        if let Some(replaced) = self.sessions.lock().insert(session.id, Arc::clone(&handle)) {
            // Its pending flush would overwrite the new session's file
            replaced.persisted.store(u64::MAX, Ordering::SeqCst);
        }
        handle
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    /// Start a fresh session, replacing any tracked one with the same id
    pub async fn start_tracking(&self, session_id: &str, file_name: &str, total_nodes: usize) -> Session {
        let session = Session::new(session_id, file_name, total_nodes);
        let handle = self.register(session.clone());
        self.logger.info(&format!(
            "Started session {} for {} ({} nodes)",
            session_id, file_name, total_nodes
        ));
        self.persist_logged(&handle).await;
        session
    }

    /// Resume the persisted session `session_id`, or start a new one.
    ///
    /// A persisted session recorded for a different node count is rejected.
    /// Nodes interrupted mid-attempt are put back to `Pending`, and so are
    /// translated nodes whose content no longer matches `nodes`.
    pub async fn resume_or_start(
        &self,
        session_id: &str,
        file_name: &str,
        nodes: &[Node],
    ) -> Result<Session, DocumentError> {
        let mut session = match self.read_session(session_id).await {
            Ok(session) => session,
            Err(PersistenceError::SessionNotFound(_)) => {
                return Ok(self.start_tracking(session_id, file_name, nodes.len()).await);
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "Session {} could not be read ({}), starting over",
                    session_id, e
                ));
                return Ok(self.start_tracking(session_id, file_name, nodes.len()).await);
            }
        };

        if session.total_nodes != nodes.len() {
            return Err(DocumentError::SessionMismatch {
                session_id: session_id.to_string(),
                expected: session.total_nodes,
                actual: nodes.len(),
            });
        }

        let reset = session.reset_interrupted();
        let hashes: HashMap<NodeId, String> =
            nodes.iter().map(|node| (node.id, node.content_hash())).collect();
        let changed = session.discard_changed(&hashes);
        if changed > 0 {
            self.logger.warn(&format!(
                "Session {}: {} node(s) changed since the last run, translating them again",
                session_id, changed
            ));
        }
        session.status = SessionStatus::Running;
        session.touch();
        self.logger.info(&format!(
            "Resuming session {}: {}/{} nodes already done, {} interrupted",
            session_id, session.completed_nodes, session.total_nodes, reset
        ));

        let handle = self.register(session.clone());
        self.persist_logged(&handle).await;
        Ok(session)
    }

    /// Record a node status change; the write to disk is coalesced
    pub async fn update_node_progress(
        &self,
        session_id: &str,
        update: NodeUpdate,
    ) -> Result<(), PersistenceError> {
        let handle = self.handle(session_id)?;
        handle.mutate(|session| session.apply(update));
        self.schedule_flush(&handle);
        Ok(())
    }

    /// Append an error to the session's error log
    pub async fn record_error(
        &self,
        session_id: &str,
        node_id: Option<NodeId>,
        message: &str,
    ) -> Result<(), PersistenceError> {
        let handle = self.handle(session_id)?;
        handle.mutate(|session| session.record_error(node_id, message));
        self.schedule_flush(&handle);
        Ok(())
    }

    /// Write the tracked state of `session_id` now
    pub async fn flush(&self, session_id: &str) -> Result<(), PersistenceError> {
        let handle = self.handle(session_id)?;
        handle.write_snapshot(&self.writes).await
    }

    /// Mark a session cancelled
    pub async fn mark_cancelled(&self, session_id: &str) -> Result<(), PersistenceError> {
        self.set_status(session_id, SessionStatus::Cancelled, None).await
    }

    /// Mark a session failed with a document-level error
    pub async fn mark_failed(&self, session_id: &str, message: &str) -> Result<(), PersistenceError> {
        self.set_status(session_id, SessionStatus::Failed, Some(message)).await
    }

    async fn set_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: Option<&str>,
    ) -> Result<(), PersistenceError> {
        let handle = self.handle(session_id)?;
        handle.mutate(|session| {
            session.status = status;
            if let Some(message) = message {
                session.record_error(None, message);
            }
            session.touch();
        });
        self.persist_logged(&handle).await;
        Ok(())
    }

    /// Finish tracking: a running session with every node terminal becomes
    /// `Completed`. Returns the final snapshot.
    pub async fn stop_tracking(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.lock().remove(session_id)?;
        handle.mutate(|session| {
            if session.status == SessionStatus::Running && session.all_terminal() {
                session.status = SessionStatus::Completed;
            }
            session.touch();
        });
        self.persist_logged(&handle).await;

        let session = handle.state.lock().clone();
        self.logger.info(&format!("Stopped tracking session: {}", session));
        Some(session)
    }

    /// In-memory snapshot of a tracked session
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.lock().get(session_id).cloned()?;
        let session = handle.state.lock().clone();
        Some(session)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load a session, preferring the tracked in-memory state
    pub async fn load_session(&self, session_id: &str) -> Result<Session, PersistenceError> {
        if let Some(session) = self.get_session(session_id) {
            return Ok(session);
        }
        self.read_session(session_id).await
    }

    /// All persisted sessions, newest first; unreadable files are skipped
    pub async fn list_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
        let dir = self.dir.clone();
        let paths = FileManager::list_files(&dir, SESSION_EXTENSION)
            .map_err(|source| PersistenceError::Io { path: dir, source })?;

        let mut sessions = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read_file(&path).await {
                Ok(session) => sessions.push(session),
                Err(e) => self
                    .logger
                    .warn(&format!("Skipping unreadable session file {:?}: {}", path, e)),
            }
        }
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    /// Delete a persisted session; returns whether a file was removed
    pub async fn delete_session(&self, session_id: &str) -> Result<bool, PersistenceError> {
        let retired = self.sessions.lock().remove(session_id);
        // A pending flush must not bring the file back
        let _guard = match &retired {
            Some(handle) => {
                let guard = handle.write_lock.lock().await;
                handle.persisted.store(u64::MAX, Ordering::SeqCst);
                Some(guard)
            }
            None => None,
        };
        let path = self.session_path(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.logger.info(&format!("Deleted session {}", session_id));
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    /// Delete finished sessions not updated for `days` days
    pub async fn cleanup_old_sessions(&self, days: u32) -> Result<usize, PersistenceError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut removed = 0;
        for session in self.list_sessions().await? {
            let finished = session.status != SessionStatus::Running;
            if finished && session.last_update_time < cutoff && self.delete_session(&session.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn read_session(&self, session_id: &str) -> Result<Session, PersistenceError> {
        let path = self.session_path(session_id);
        match Self::read_file(&path).await {
            Err(PersistenceError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Err(PersistenceError::SessionNotFound(session_id.to_string()))
            }
            other => other,
        }
    }

    async fn read_file(path: &Path) -> Result<Session, PersistenceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Start a delayed write unless one is already pending
    fn schedule_flush(&self, handle: &Arc<SessionHandle>) {
        if handle.flush_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = Arc::clone(handle);
        let logger = self.logger.clone();
        let writes = Arc::clone(&self.writes);
        let interval = self.flush_interval;
        tokio::spawn(async move {
            let since_last = handle.last_flush.lock().elapsed();
            if since_last < interval {
                tokio::time::sleep(interval - since_last).await;
            }
            // Changes made from here on schedule the next flush
            handle.flush_pending.store(false, Ordering::SeqCst);
            if let Err(e) = handle.write_snapshot(&writes).await {
                logger.error(&format!("Failed to persist session, continuing in memory: {}", e));
            }
        });
    }

    async fn persist_logged(&self, handle: &SessionHandle) {
        if let Err(e) = handle.write_snapshot(&self.writes).await {
            self.logger
                .error(&format!("Failed to persist session, continuing in memory: {}", e));
        }
    }
}
