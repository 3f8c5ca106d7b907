use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use study_core::{Concept, ExtractedDocument};
use study_engine::{
    write_atomically, ContentCache, FileStore, KvStore, MemoryStore, StoreError,
    CHAT_SESSION_KEY, CONCEPTS_KEY, INFO_KEY, LEARN_EXPLANATIONS_KEY, URL_KEY,
};
use tempfile::TempDir;

fn sample_document() -> ExtractedDocument {
    ExtractedDocument {
        document_id: "doc-1".to_string(),
        url: "https://example.com/rust".to_string(),
        title: Some("Rust".to_string()),
        summary: None,
        text_length: 4200,
        chunks_indexed: 7,
        concepts: vec![
            Concept {
                title: "Ownership".to_string(),
                description: Some("Each value has one owner".to_string()),
            },
            Concept {
                title: "Borrowing".to_string(),
                description: None,
            },
        ],
    }
}

#[test]
fn file_store_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("store.ron");

    let store = FileStore::open(&path);
    store.set("extractedUrl", "https://example.com").unwrap();
    store.set("chatSessionId", "user_1").unwrap();
    store.remove("chatSessionId").unwrap();
    assert!(path.is_file());

    let reopened = FileStore::open(&path);
    assert_eq!(
        reopened.get("extractedUrl").as_deref(),
        Some("https://example.com")
    );
    assert_eq!(reopened.get("chatSessionId"), None);
}

#[test]
fn unreadable_store_starts_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.ron");
    fs::write(&path, "not ron {{{").unwrap();

    let store = FileStore::open(&path);
    assert_eq!(store.get("extractedUrl"), None);
    store.set("extractedUrl", "x").unwrap();
    assert_eq!(FileStore::open(&path).get("extractedUrl").as_deref(), Some("x"));
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.ron");
    write_atomically(&path, "first").unwrap();
    write_atomically(&path, "second").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn atomic_write_fails_when_parent_is_a_file() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let result = write_atomically(&blocker.join("store.ron"), "data");
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}

#[test]
fn gate_requires_concepts_and_info() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    assert!(!cache.has_extracted_content());

    store.set(CONCEPTS_KEY, "[\"Ownership\"]").unwrap();
    assert!(!cache.has_extracted_content());

    store.set(INFO_KEY, "").unwrap();
    assert!(!cache.has_extracted_content());

    store.set(INFO_KEY, "{\"url\":\"https://example.com\"}").unwrap();
    assert!(cache.has_extracted_content());
}

#[test]
fn document_round_trips_through_cache() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    store.set(LEARN_EXPLANATIONS_KEY, "{}").unwrap();

    let document = sample_document();
    cache.write_document(&document).unwrap();

    assert!(cache.has_extracted_content());
    assert_eq!(cache.document_id().as_deref(), Some("doc-1"));
    assert_eq!(cache.url().as_deref(), Some("https://example.com/rust"));
    assert_eq!(store.get(LEARN_EXPLANATIONS_KEY), None);
    pretty_assertions::assert_eq!(cache.load_document(), Some(document));
}

#[test]
fn legacy_label_concepts_are_normalized() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    store
        .set(
            CONCEPTS_KEY,
            r#"["Ownership", {"name": "Lifetimes", "description": "Scopes of borrows"}, "  ", 7]"#,
        )
        .unwrap();

    let titles: Vec<String> = cache.concepts().into_iter().map(|c| c.title).collect();
    assert_eq!(titles, vec!["Ownership", "Lifetimes"]);
}

#[test]
fn clear_extracted_keeps_chat_session_but_clear_all_does_not() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    cache.write_document(&sample_document()).unwrap();
    store.set(CHAT_SESSION_KEY, "user_42").unwrap();

    cache.clear_extracted().unwrap();
    assert!(!cache.has_extracted_content());
    assert_eq!(cache.document_id(), None);
    assert_eq!(store.get(CHAT_SESSION_KEY).as_deref(), Some("user_42"));

    cache.clear_all().unwrap();
    assert!(store.is_empty());
}

/// Fails the next write to the URL entry after being armed.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

impl KvStore for FlakyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == URL_KEY && self.armed.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

#[test]
fn failed_write_keeps_previous_document() {
    let store = Arc::new(FlakyStore::default());
    let cache = ContentCache::new(store.clone());
    let previous = sample_document();
    cache.write_document(&previous).unwrap();
    cache
        .store_explanation("Ownership", "Values have one owner.")
        .unwrap();

    store.armed.store(true, Ordering::SeqCst);
    let replacement = ExtractedDocument {
        document_id: "doc-2".to_string(),
        url: "https://example.com/tokio".to_string(),
        title: Some("Tokio".to_string()),
        concepts: vec![Concept {
            title: "Runtimes".to_string(),
            description: None,
        }],
        ..ExtractedDocument::default()
    };
    assert!(cache.write_document(&replacement).is_err());

    pretty_assertions::assert_eq!(cache.load_document(), Some(previous));
    assert_eq!(
        cache.explanation("Ownership").as_deref(),
        Some("Values have one owner.")
    );
}

#[test]
fn unrestorable_write_clears_cached_document() {
    let store = Arc::new(UrlRejectingStore::default());
    let cache = ContentCache::new(store.clone());
    store.inner.set(URL_KEY, "https://example.com/old").unwrap();
    store.inner.set(CONCEPTS_KEY, "[\"Ownership\"]").unwrap();
    store.inner.set(INFO_KEY, "{\"url\":\"https://example.com/old\"}").unwrap();

    assert!(cache.write_document(&sample_document()).is_err());

    assert!(!cache.has_extracted_content());
    assert_eq!(cache.url(), None);
}

#[test]
fn explanations_accumulate_per_concept() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    assert_eq!(cache.explanation("Ownership"), None);

    cache.store_explanation("Ownership", "first").unwrap();
    cache.store_explanation("Borrowing", "shared or unique").unwrap();
    cache.store_explanation("Ownership", "second").unwrap();

    assert_eq!(cache.explanation("Ownership").as_deref(), Some("second"));
    assert_eq!(
        cache.explanation("Borrowing").as_deref(),
        Some("shared or unique")
    );
    let stored: serde_json::Value =
        serde_json::from_str(&store.get(LEARN_EXPLANATIONS_KEY).unwrap()).unwrap();
    assert_eq!(stored["Borrowing"], "shared or unique");
}

#[test]
fn unreadable_explanations_are_replaced() {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    store.set(LEARN_EXPLANATIONS_KEY, "[1, 2").unwrap();

    assert_eq!(cache.explanation("Ownership"), None);
    cache.store_explanation("Ownership", "one owner").unwrap();
    assert_eq!(cache.explanation("Ownership").as_deref(), Some("one owner"));
}

#[derive(Default)]
struct UrlRejectingStore {
    inner: MemoryStore,
}

impl KvStore for UrlRejectingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == URL_KEY {
            return Err(StoreError::Directory("read-only".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}
