/*!
 * Tests for the session store
 */

use std::sync::Arc;

use nodeweave::node::NodeStatus;
use nodeweave::session::{NodeUpdate, SessionStatus, SessionStore};

#[tokio::test]
async fn test_concurrentUpdates_shouldAllLandInOneSession() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    store.start_tracking("busy", "doc.txt", 20).await;

    let mut tasks = Vec::new();
    for id in 1..=20u64 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store
                .update_node_progress("busy", NodeUpdate::new(id, NodeStatus::InProgress, 4))
                .await
                .unwrap();
            store
                .update_node_progress(
                    "busy",
                    NodeUpdate::new(id, NodeStatus::Success, 4).with_translation(format!("t{}", id)),
                )
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let session = store.stop_tracking("busy").await.unwrap();
    assert_eq!(session.completed_nodes, 20);
    assert_eq!(session.status, SessionStatus::Completed);

    // The file holds the final state, not an older snapshot
    let reopened = SessionStore::open(dir.path()).unwrap();
    let persisted = reopened.load_session("busy").await.unwrap();
    assert_eq!(persisted.completed_nodes, 20);
    assert_eq!(persisted.successful_translations().len(), 20);
}

#[tokio::test]
async fn test_listSessions_shouldSkipUnreadableFiles() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    store.start_tracking("good", "doc.txt", 1).await;
    std::fs::write(dir.path().join("broken.json"), "{").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a session").unwrap();

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "good");
}

#[tokio::test]
async fn test_listSessions_shouldReturnNewestFirst() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    store.start_tracking("older", "a.txt", 1).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.start_tracking("newer", "b.txt", 1).await;

    let ids: Vec<String> = store
        .list_sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["newer".to_string(), "older".to_string()]);
}

#[tokio::test]
async fn test_markFailed_shouldRecordDocumentError() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    store.start_tracking("doomed", "doc.txt", 2).await;
    store.mark_failed("doomed", "output not writable").await.unwrap();

    let session = store.stop_tracking("doomed").await.unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.errors.len(), 1);
    assert_eq!(session.errors[0].node_id, None);
}

#[tokio::test]
async fn test_loadSession_withUnknownId_shouldReturnNotFound() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    let err = store.load_session("ghost").await.unwrap_err();
    assert!(err.to_string().contains("ghost"));
}
