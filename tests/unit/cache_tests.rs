/*!
 * Tests for the stage cache
 */

use std::sync::Arc;

use nodeweave::translation::{CacheKey, FileCache, MemoryCache, TranslationCache};

fn key(content: &str, target: &str) -> CacheKey {
    CacheKey::compute(content, "en", target, "translate|mock|m", 0)
}

#[tokio::test]
async fn test_fileCache_concurrentWritersOnOneKey_shouldAlwaysReadWholeValue() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCache::open(dir.path()).unwrap());
    let key = key("Hello", "fr");
    let values: Vec<String> = (0..8).map(|i| format!("value-{}-{}", i, "x".repeat(512))).collect();

    let mut tasks = Vec::new();
    for value in values.clone() {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            cache.set(&key, &value).await.unwrap();
            cache.get(&key).await.unwrap()
        }));
    }

    for task in tasks {
        let read = task.await.unwrap().unwrap();
        assert!(values.contains(&read), "torn read: {}", &read[..20]);
    }
    assert_eq!(cache.stats().unwrap().entries, 1);
}

#[tokio::test]
async fn test_fileCache_entries_shouldBeFlatContentKeyedFiles() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::open(dir.path()).unwrap();
    let key = key("Hello", "fr");
    cache.set(&key, "Bonjour").await.unwrap();

    let path = dir.path().join(format!("{}.cache", key.as_str()));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "Bonjour");
}

#[tokio::test]
async fn test_cacheKey_withDifferentTargets_shouldNotCollide() {
    let cache = MemoryCache::new();
    cache.set(&key("Hello", "fr"), "Bonjour").await.unwrap();
    cache.set(&key("Hello", "de"), "Hallo").await.unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("Hello", "de")).await.unwrap().as_deref(), Some("Hallo"));
}

#[tokio::test]
async fn test_memoryCache_clear_shouldDropEverything() {
    let cache = MemoryCache::new();
    cache.set(&key("a", "fr"), "x").await.unwrap();
    cache.clear().await.unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.get(&key("a", "fr")).await.unwrap(), None);
}
