/*!
 * Integration tests for the translation engine.
 *
 * Runs node lists through the controller with mock providers and checks the
 * run-level guarantees: cache reuse, fast mode, partial failure, resume and
 * cancellation.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nodeweave::errors::DocumentError;
use nodeweave::node::{NodeStatus, content_hash};
use nodeweave::providers::mock::MockProvider;
use nodeweave::session::{NodeUpdate, SessionStatus, SessionStore};
use nodeweave::translation::{MemoryCache, StepSet, TranslationCache};

use crate::common::mock_providers::{MOCK_PROVIDER, marker_failing_provider, registry_with};
use crate::common::{init_logging, nodes, test_config, test_controller, text_of_len};

fn quality(threshold: usize) -> StepSet {
    StepSet::three_stage("quality", MOCK_PROVIDER, "test-model", threshold)
}

fn fast() -> StepSet {
    StepSet::translate_only("fast", MOCK_PROVIDER, "test-model")
}

#[tokio::test]
async fn test_translateNodes_withIdenticalContentTwice_shouldCallProviderOnce() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let cache = Arc::new(MemoryCache::new());
    let (controller, _) = test_controller(
        dir.path(),
        test_config(quality(0), 0),
        registry_with(&provider),
        Some(cache.clone()),
    )
    .unwrap();

    let first = controller
        .translate_nodes("first", "a.txt", nodes(&["Shared paragraph"]))
        .await
        .unwrap();
    let second = controller
        .translate_nodes("second", "b.txt", nodes(&["Shared paragraph"]))
        .await
        .unwrap();

    // One sequence of three stages, the second run is served from the cache
    assert_eq!(provider.call_count(), 3);
    assert_eq!(first.translations[&1], second.translations[&1]);
    assert_eq!(second.usage.cache_hits, 3);
}

#[tokio::test]
async fn test_translateNodes_withTwoTargetLanguages_shouldKeepSeparateEntries() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let cache = Arc::new(MemoryCache::new());

    for target in ["fr", "de"] {
        let mut config = test_config(fast(), 0);
        config.target_language = target.to_string();
        let (controller, _) =
            test_controller(dir.path(), config, registry_with(&provider), Some(cache.clone()))
                .unwrap();
        let report = controller
            .translate_nodes(target, "doc.txt", nodes(&["Hello"]))
            .await
            .unwrap();
        assert_eq!(report.translations[&1], format!("[{}] Hello", target));
    }

    assert_eq!(provider.call_count(), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_translateNodes_aroundFastModeThreshold_shouldSkipRefinementBelowIt() {
    let dir = tempfile::tempdir().unwrap();

    let short = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(quality(300), 0), registry_with(&short), None)
            .unwrap();
    let short_text = text_of_len(299);
    controller
        .translate_nodes("short", "doc.txt", nodes(&[&short_text]))
        .await
        .unwrap();
    assert_eq!(short.call_count(), 1);

    let long = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(quality(300), 0), registry_with(&long), None)
            .unwrap();
    let long_text = text_of_len(301);
    controller
        .translate_nodes("long", "doc.txt", nodes(&[&long_text]))
        .await
        .unwrap();
    assert_eq!(long.call_count(), 3);
}

#[tokio::test]
async fn test_translateNodes_withOneAlwaysFailingNode_shouldReportPartialFailure() {
    let dir = tempfile::tempdir().unwrap();
    let provider = marker_failing_provider();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 2), registry_with(&provider), None)
            .unwrap();

    let report = controller
        .translate_nodes("partial", "doc.txt", nodes(&["one", "FAIL two", "three"]))
        .await
        .unwrap();

    assert_eq!(report.total_nodes, 3);
    assert_eq!(report.completed_nodes, 2);
    assert_eq!(report.failed_nodes, 1);
    assert!((report.progress - 66.67).abs() < 0.01);
    // Two clean nodes plus one initial attempt and two retries
    assert_eq!(provider.call_count(), 5);

    let session = controller.sessions().load_session("partial").await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.node_status(2), NodeStatus::Failed);
    assert!(session.node_progress[&2].error.is_some());
}

#[tokio::test]
async fn test_translateNodes_afterCrash_shouldOnlyDispatchPendingNode() {
    let dir = tempfile::tempdir().unwrap();
    {
        // A run that stopped after two nodes, without finishing its session
        let store = SessionStore::open(dir.path().join("sessions")).unwrap();
        store.start_tracking("crash", "doc.txt", 3).await;
        for (id, source, text) in [(1, "one", "un"), (2, "two", "deux")] {
            store
                .update_node_progress(
                    "crash",
                    NodeUpdate::new(id, NodeStatus::Success, 3)
                        .with_translation(text)
                        .with_content_hash(content_hash(source)),
                )
                .await
                .unwrap();
        }
        store.flush("crash").await.unwrap();
    }

    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), None)
            .unwrap();
    let report = controller
        .translate_nodes("crash", "doc.txt", nodes(&["one", "two", "three"]))
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "three");
    assert_eq!(report.completed_nodes, 3);
    assert_eq!(report.translations[&1], "un");
    assert_eq!(report.translations[&3], "[fr] three");
}

#[tokio::test]
async fn test_translateNodes_resumingWithSuccessfulNodes_shouldDispatchTheRest() {
    let dir = tempfile::tempdir().unwrap();
    let contents = ["a", "b", "c", "d", "e"];

    let failing = marker_failing_provider();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&failing), None)
            .unwrap();
    let first = controller
        .translate_nodes("resume", "doc.txt", nodes(&["a", "b", "FAIL c", "FAIL d", "FAIL e"]))
        .await
        .unwrap();
    assert_eq!(first.completed_nodes, 2);

    // Same node count, the previously failed nodes now succeed
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), None)
            .unwrap();
    let second = controller
        .translate_nodes("resume", "doc.txt", nodes(&contents))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), contents.len() - 2);
    assert_eq!(second.resumed_nodes, 2);
    assert_eq!(second.completed_nodes, 5);
}

#[tokio::test]
async fn test_translateNodes_withEditedContentUnderSameSession_shouldRetranslateEditedNodes() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), None)
            .unwrap();
    controller
        .translate_nodes("edited", "doc.txt", nodes(&["Hello", "World"]))
        .await
        .unwrap();

    let second = controller
        .translate_nodes("edited", "doc.txt", nodes(&["Goodbye", "World"]))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 3);
    assert_eq!(second.resumed_nodes, 1);
    assert_eq!(second.translations[&1], "[fr] Goodbye");
    assert_eq!(second.translations[&2], "[fr] World");
}

#[tokio::test]
async fn test_translateNodes_withManyNodes_shouldNotWriteSessionPerUpdate() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let mut config = test_config(fast(), 0);
    config.engine.concurrency = 8;
    let (controller, _) =
        test_controller(dir.path(), config, registry_with(&provider), None).unwrap();

    let contents: Vec<String> = (0..200).map(|i| format!("paragraph {}", i)).collect();
    let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
    let report = controller
        .translate_nodes("bulk", "doc.txt", nodes(&refs))
        .await
        .unwrap();

    assert_eq!(report.completed_nodes, 200);
    // 400 status changes; writes are bounded by the flush interval instead
    assert!(
        controller.sessions().write_count() <= 10,
        "wrote the session {} times",
        controller.sessions().write_count()
    );
    let session = SessionStore::open(dir.path().join("sessions"))
        .unwrap()
        .load_session("bulk")
        .await
        .unwrap();
    assert_eq!(session.completed_nodes, 200);
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_translateNodes_withChangedNodeCount_shouldRejectResume() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), None)
            .unwrap();
    controller
        .translate_nodes("doc", "doc.txt", nodes(&["a", "b"]))
        .await
        .unwrap();

    let err = controller
        .translate_nodes("doc", "doc.txt", nodes(&["a", "b", "c"]))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::SessionMismatch { expected: 2, actual: 3, .. }));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_translateNodes_whileRunning_shouldKeepCountersWithinTotal() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::fail_times(4);
    let mut config = test_config(fast(), 3);
    config.engine.concurrency = 3;
    let (controller, _) =
        test_controller(dir.path(), config, registry_with(&provider), None).unwrap();
    let store = controller.sessions();
    let done = AtomicBool::new(false);

    let contents: Vec<String> = (0..12).map(|i| format!("node {}", i)).collect();
    let refs: Vec<&str> = contents.iter().map(String::as_str).collect();

    let run = async {
        let report = controller.translate_nodes("inv", "doc.txt", nodes(&refs)).await;
        done.store(true, Ordering::SeqCst);
        report
    };
    let watch = async {
        let mut observations = 0;
        while !done.load(Ordering::SeqCst) {
            if let Some(session) = store.get_session("inv") {
                assert!(session.completed_nodes + session.failed_nodes <= session.total_nodes);
                observations += 1;
            }
            tokio::task::yield_now().await;
        }
        observations
    };
    let (report, _) = tokio::join!(run, watch);

    let report = report.unwrap();
    assert_eq!(report.completed_nodes, 12);
    let session = store.load_session("inv").await.unwrap();
    assert_eq!(session.completed_nodes + session.failed_nodes, session.total_nodes);
}

#[tokio::test]
async fn test_translateNodes_withEmptyNode_shouldFailWithoutRetry() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, logger) =
        test_controller(dir.path(), test_config(fast(), 3), registry_with(&provider), None)
            .unwrap();

    let report = controller
        .translate_nodes("empty", "doc.txt", nodes(&["real text", "   "]))
        .await
        .unwrap();

    assert_eq!(report.completed_nodes, 1);
    assert_eq!(report.failed_nodes, 1);
    assert_eq!(provider.call_count(), 1);
    assert!(logger.contains(log::Level::Error, "failed after 1 attempt"));
}

#[tokio::test]
async fn test_translateNodes_whenCancelled_shouldStopDispatchAndResumeLater() {
    let dir = tempfile::tempdir().unwrap();
    let slow = MockProvider::slow(100);
    let mut config = test_config(fast(), 0);
    config.engine.concurrency = 1;
    let (controller, _) =
        test_controller(dir.path(), config.clone(), registry_with(&slow), None).unwrap();

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });
    let contents = ["a", "b", "c", "d"];
    let report = controller
        .translate_nodes("cancel", "doc.txt", nodes(&contents))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.completed_nodes >= 1);
    assert!(report.completed_nodes < contents.len());
    assert_eq!(slow.call_count(), report.completed_nodes);
    let session = controller.sessions().load_session("cancel").await.unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);

    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), config, registry_with(&provider), None).unwrap();
    let resumed = controller
        .translate_nodes("cancel", "doc.txt", nodes(&contents))
        .await
        .unwrap();
    assert_eq!(provider.call_count(), contents.len() - report.completed_nodes);
    assert_eq!(resumed.completed_nodes, contents.len());
}

#[tokio::test]
async fn test_sessionFile_shouldUseDocumentedKeys() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), None)
            .unwrap();
    controller
        .translate_nodes("keys", "doc.txt", nodes(&["Hello"]))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join("sessions").join("keys.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for key in [
        "id",
        "fileName",
        "startTime",
        "lastUpdateTime",
        "status",
        "totalNodes",
        "completedNodes",
        "nodeProgress",
        "errors",
    ] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(json["status"], "Completed");
    assert_eq!(json["nodeProgress"]["1"]["status"], "Success");
}

#[tokio::test]
async fn test_translationCache_shouldBeUsableAsTraitObject() {
    let cache: Arc<dyn TranslationCache> = Arc::new(MemoryCache::new());
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), test_config(fast(), 0), registry_with(&provider), Some(cache))
            .unwrap();
    let report = controller
        .translate_nodes("dyn", "doc.txt", nodes(&["Hello"]))
        .await
        .unwrap();
    assert_eq!(report.usage.cache_misses, 1);
}
