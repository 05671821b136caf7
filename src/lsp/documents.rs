//! Open-document tracking backing the stale-result checks

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tower_lsp::lsp_types::Url;

use crate::version::scanner::ScanGuard;

struct OpenDocument {
    text: String,
    generation: u64,
}

/// Tracks open manifest documents and a per-content generation number.
///
/// A scan snapshots the generation it started from; any later change or
/// close invalidates results still in flight for the old content, which
/// are then dropped instead of applied.
#[derive(Default)]
pub struct DocumentStore {
    documents: Mutex<HashMap<Url, OpenDocument>>,
    next_generation: AtomicU64,
}

impl DocumentStore {
    /// Stores the current text for `uri` and returns its new generation.
    pub fn insert(&self, uri: Url, text: String) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .insert(uri, OpenDocument { text, generation });
        generation
    }

    pub fn close(&self, uri: &Url) {
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .remove(uri);
    }

    /// Current text and generation, if the document is open.
    pub fn snapshot(&self, uri: &Url) -> Option<(String, u64)> {
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .get(uri)
            .map(|document| (document.text.clone(), document.generation))
    }

    pub fn is_current(&self, uri: &Url, generation: u64) -> bool {
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .get(uri)
            .is_some_and(|document| document.generation == generation)
    }

    /// URIs of every open document, for bulk rescans.
    pub fn uris(&self) -> Vec<Url> {
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// [`ScanGuard`] pinned to one document content generation.
pub struct DocumentSnapshot {
    store: Arc<DocumentStore>,
    uri: Url,
    generation: u64,
}

impl DocumentSnapshot {
    pub fn new(store: Arc<DocumentStore>, uri: Url, generation: u64) -> Self {
        Self {
            store,
            uri,
            generation,
        }
    }
}

impl ScanGuard for DocumentSnapshot {
    fn is_current(&self) -> bool {
        self.store.is_current(&self.uri, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///project/package.json").unwrap()
    }

    #[test]
    fn snapshot_returns_latest_text_and_generation() {
        let store = DocumentStore::default();

        let first = store.insert(uri(), "{}".to_string());
        let (text, generation) = store.snapshot(&uri()).unwrap();

        assert_eq!(text, "{}");
        assert_eq!(generation, first);
    }

    #[test]
    fn content_change_invalidates_previous_generation() {
        let store = DocumentStore::default();

        let first = store.insert(uri(), "{}".to_string());
        assert!(store.is_current(&uri(), first));

        store.insert(uri(), r#"{"dependencies":{}}"#.to_string());
        assert!(!store.is_current(&uri(), first));
    }

    #[test]
    fn close_invalidates_all_generations() {
        let store = DocumentStore::default();

        let generation = store.insert(uri(), "{}".to_string());
        store.close(&uri());

        assert!(!store.is_current(&uri(), generation));
        assert!(store.snapshot(&uri()).is_none());
    }

    #[test]
    fn document_snapshot_guard_follows_store_state() {
        let store = Arc::new(DocumentStore::default());
        let generation = store.insert(uri(), "{}".to_string());

        let guard = DocumentSnapshot::new(store.clone(), uri(), generation);
        assert!(guard.is_current());

        store.insert(uri(), "changed".to_string());
        assert!(!guard.is_current());
    }
}
