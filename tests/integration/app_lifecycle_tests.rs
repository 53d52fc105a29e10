/*!
 * Full app lifecycle tests: document in, translated document out.
 */

use std::sync::Arc;

use nodeweave::app_config::Config;
use nodeweave::app_controller::Controller;
use nodeweave::errors::DocumentError;
use nodeweave::providers::mock::MockProvider;
use nodeweave::translation::{FileCache, StepSet};

use crate::common::mock_providers::{MOCK_PROVIDER, marker_failing_provider, registry_with};
use crate::common::{create_test_document, create_test_file, test_config, test_controller};

fn fast_config() -> Config {
    test_config(StepSet::translate_only("fast", MOCK_PROVIDER, "m"), 0)
}

#[tokio::test]
async fn test_translateFile_shouldTranslateParagraphsAndKeepCode() {
    let dir = tempfile::tempdir().unwrap();
    let input = create_test_document(dir.path(), "notes.txt").unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), fast_config(), registry_with(&provider), None).unwrap();

    let result = controller.translate_file(&input, None, None).await.unwrap();

    assert_eq!(result.output_file, dir.path().join("notes.fr.txt"));
    assert_eq!(result.total_nodes, 3);
    assert_eq!(result.completed_nodes, 3);
    assert_eq!(result.progress, 100.0);

    let output = std::fs::read_to_string(&result.output_file).unwrap();
    assert_eq!(
        output,
        "[fr] The first paragraph.\n\n\
         ```\nlet untouched = true;\n```\n\n\
         [fr] The second paragraph\nspans two lines.\n\n\
         [fr] The third paragraph.\n"
    );
}

#[tokio::test]
async fn test_translateFile_rerunWithSameInput_shouldResumeWithoutCalls() {
    let dir = tempfile::tempdir().unwrap();
    let input = create_test_document(dir.path(), "notes.txt").unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), fast_config(), registry_with(&provider), None).unwrap();

    let first = controller.translate_file(&input, None, None).await.unwrap();
    let second = controller.translate_file(&input, None, None).await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(second.completed_nodes, 3);
}

#[tokio::test]
async fn test_translateFile_withFailedNode_shouldKeepOriginalText() {
    let dir = tempfile::tempdir().unwrap();
    let input = create_test_file(dir.path(), "doc.txt", "Hello\n\nFAIL here\n").unwrap();
    let output = dir.path().join("out").join("doc.txt");
    let provider = marker_failing_provider();
    let (controller, _) =
        test_controller(dir.path(), fast_config(), registry_with(&provider), None).unwrap();

    let result = controller
        .translate_file(&input, Some(&output), Some("explicit"))
        .await
        .unwrap();

    assert_eq!(result.session_id, "explicit");
    assert_eq!(result.failed_nodes, 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "[fr] Hello\n\nFAIL here\n");
}

#[tokio::test]
async fn test_translateFile_withMissingInput_shouldReturnReadError() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), fast_config(), registry_with(&provider), None).unwrap();

    let err = controller
        .translate_file(&dir.path().join("missing.txt"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::Read { .. })));
}

#[tokio::test]
async fn test_translateFile_withBlankDocument_shouldReturnNoNodes() {
    let dir = tempfile::tempdir().unwrap();
    let input = create_test_file(dir.path(), "blank.txt", "\n\n   \n").unwrap();
    let provider = MockProvider::working();
    let (controller, _) =
        test_controller(dir.path(), fast_config(), registry_with(&provider), None).unwrap();

    let err = controller.translate_file(&input, None, None).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::NoNodes(_))));
    assert_eq!(provider.call_count(), 0);
    assert!(!dir.path().join("blank.fr.txt").exists());
}

#[tokio::test]
async fn test_translateFile_withFileCache_shouldShareResultsAcrossSessions() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCache::open(dir.path().join("cache")).unwrap());
    let provider = MockProvider::working();
    let (controller, _) = test_controller(
        dir.path(),
        fast_config(),
        registry_with(&provider),
        Some(cache.clone()),
    )
    .unwrap();

    let a = create_test_file(dir.path(), "a.txt", "Same words\n").unwrap();
    let b = create_test_file(dir.path(), "b.txt", "Same words\n\nNew words\n").unwrap();
    controller.translate_file(&a, None, None).await.unwrap();
    controller.translate_file(&b, None, None).await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert_eq!(cache.stats().unwrap().entries, 2);
}

#[test]
fn test_withConfig_withDefaultConfig_shouldBuildController() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.engine.cache_dir = dir.path().join("cache");
    config.engine.session_dir = dir.path().join("sessions");

    let controller = Controller::with_config(config).unwrap();
    assert_eq!(controller.config().active_step_set, "quality");
    assert!(dir.path().join("cache").is_dir());
    assert!(dir.path().join("sessions").is_dir());
}

#[test]
fn test_withConfig_withUnknownStepSet_shouldFail() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.engine.session_dir = dir.path().join("sessions");
    config.engine.cache_enabled = false;
    config.active_step_set = "missing".to_string();

    assert!(Controller::with_config(config).is_err());
}
