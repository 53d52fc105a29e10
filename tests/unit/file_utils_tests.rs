/*!
 * Tests for file and folder utilities
 */

use std::time::{Duration, SystemTime};

use nodeweave::file_utils::FileManager;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_writeToFile_shouldCreateMissingParents() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("a").join("b").join("out.txt");

    FileManager::write_to_file(&path, "content").unwrap();
    assert_eq!(FileManager::read_to_string(&path).unwrap(), "content");
}

#[test]
fn test_listFiles_withMissingDirectory_shouldBeEmpty() {
    let dir = create_temp_dir().unwrap();
    let files = FileManager::list_files(dir.path().join("absent"), "json").unwrap();
    assert!(files.is_empty());
}

#[test]
fn test_filesModifiedBefore_withPastCutoff_shouldReturnNothing() {
    let dir = create_temp_dir().unwrap();
    create_test_file(dir.path(), "a.cache", "x").unwrap();

    let cutoff = SystemTime::now() - Duration::from_secs(3600);
    let stale = FileManager::files_modified_before(dir.path(), "cache", cutoff).unwrap();
    assert!(stale.is_empty());
}

#[test]
fn test_generateOutputPath_withoutExtension_shouldAppendLanguage() {
    let path = FileManager::generate_output_path("/docs/README", "/out", "de");
    assert_eq!(path, std::path::PathBuf::from("/out/README.de"));
}
