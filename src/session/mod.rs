/*!
 * Session tracking for translation runs.
 *
 * This module provides:
 * - `models`: the persisted session record and per-node progress
 * - `store`: lifecycle operations and JSON persistence
 *
 * A session survives a crash; resuming it skips nodes already translated.
 */

pub mod models;
pub mod store;

// Re-export main types
pub use models::{ErrorInfo, NodeProgress, NodeUpdate, Session, SessionStatus};
pub use store::SessionStore;
