//! Memoizing query cache with in-flight request deduplication
//!
//! Both query types are memoized per key for the lifetime of the process,
//! until an explicit [`QueryCache::clear`]. The pending fetch itself is
//! stored on first miss, so concurrent lookups for the same key join one
//! underlying request instead of each issuing their own. Settled failures
//! are never stored: the slot is released and the next pass retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use crate::version::advisory::Advisory;
use crate::version::registry::NpmRegistryApi;

/// Marker for a settled fetch failure. It carries no detail: the failure
/// was already logged at the registry boundary, and waiters only need to
/// know there is no usable result this pass.
#[derive(Debug, Clone, Copy)]
struct FetchFailed;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, FetchFailed>>>;

enum Slot<T> {
    /// A previous fetch settled with a stable result.
    Ready(T),
    /// A fetch is in flight; waiters clone and await the same future.
    /// The id distinguishes this fetch from successors after a `clear`.
    Pending(u64, SharedFetch<T>),
}

type SlotMap<T> = Mutex<HashMap<String, Slot<T>>>;

struct CacheState {
    registry: Arc<dyn NpmRegistryApi>,
    latest: SlotMap<Option<String>>,
    advisories: SlotMap<Vec<Advisory>>,
    next_fetch_id: AtomicU64,
}

/// Cheaply cloneable handle to the process-wide query cache. All access to
/// the underlying maps goes through the two lookups and `clear`; invariants
/// (stable-result memoization, in-flight deduplication) are enforced here
/// and nowhere else.
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<CacheState>,
}

impl QueryCache {
    pub fn new(registry: Arc<dyn NpmRegistryApi>) -> Self {
        Self {
            state: Arc::new(CacheState {
                registry,
                latest: Mutex::new(HashMap::new()),
                advisories: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    /// Latest published version for `name`, memoized.
    ///
    /// `None` covers both a registry-confirmed missing package (memoized)
    /// and a fetch failure (not memoized, retried on the next lookup).
    /// Cache hits resolve without suspending.
    pub async fn latest_version(&self, name: &str) -> Option<String> {
        let fetch = {
            let mut slots = self.state.latest.lock().expect("cache mutex poisoned");
            match slots.get(name) {
                Some(Slot::Ready(value)) => return value.clone(),
                Some(Slot::Pending(_, fetch)) => fetch.clone(),
                None => {
                    let id = self.state.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = start_latest_fetch(self.state.clone(), name.to_string(), id);
                    slots.insert(name.to_string(), Slot::Pending(id, fetch.clone()));
                    fetch
                }
            }
        };

        fetch.await.unwrap_or_default()
    }

    /// Advisories for `name` at `version`, memoized under `name@version`.
    ///
    /// An empty list is a registry-confirmed stable result and is memoized;
    /// failures degrade to an empty list without being memoized.
    pub async fn advisories(&self, name: &str, version: &str) -> Vec<Advisory> {
        let key = format!("{name}@{version}");
        let fetch = {
            let mut slots = self.state.advisories.lock().expect("cache mutex poisoned");
            match slots.get(&key) {
                Some(Slot::Ready(list)) => return list.clone(),
                Some(Slot::Pending(_, fetch)) => fetch.clone(),
                None => {
                    let id = self.state.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = start_advisories_fetch(
                        self.state.clone(),
                        key.clone(),
                        name.to_string(),
                        version.to_string(),
                        id,
                    );
                    slots.insert(key, Slot::Pending(id, fetch.clone()));
                    fetch
                }
            }
        };

        fetch.await.unwrap_or_default()
    }

    /// Drops every cached entry for both query types.
    ///
    /// In-flight fetches are not cancelled; their results still land in the
    /// (now empty) cache when they settle.
    pub fn clear(&self) {
        self.state.latest.lock().expect("cache mutex poisoned").clear();
        self.state
            .advisories
            .lock()
            .expect("cache mutex poisoned")
            .clear();
        debug!("query caches cleared");
    }
}

fn start_latest_fetch(
    state: Arc<CacheState>,
    name: String,
    id: u64,
) -> SharedFetch<Option<String>> {
    async move {
        let outcome = state.registry.latest_version(&name).await.map_err(|e| {
            debug!("latest-version fetch for {} failed: {}", name, e);
            FetchFailed
        });
        settle(&state.latest, &name, id, outcome)
    }
    .boxed()
    .shared()
}

fn start_advisories_fetch(
    state: Arc<CacheState>,
    key: String,
    name: String,
    version: String,
    id: u64,
) -> SharedFetch<Vec<Advisory>> {
    async move {
        let outcome = state.registry.advisories(&name, &version).await.map_err(|e| {
            debug!("advisory fetch for {} failed: {}", key, e);
            FetchFailed
        });
        settle(&state.advisories, &key, id, outcome)
    }
    .boxed()
    .shared()
}

/// Replaces this fetch's pending slot with its settled outcome. Stable
/// results are stored unconditionally, even into a cache emptied by `clear`
/// while the fetch was in flight. Failures release the slot so a later
/// lookup retries; the id guard keeps a stale failed fetch from evicting a
/// successor entry created after a `clear`.
fn settle<T: Clone>(
    slots: &SlotMap<T>,
    key: &str,
    id: u64,
    outcome: Result<T, FetchFailed>,
) -> Result<T, FetchFailed> {
    let mut slots = slots.lock().expect("cache mutex poisoned");
    match &outcome {
        Ok(value) => {
            slots.insert(key.to_string(), Slot::Ready(value.clone()));
        }
        Err(FetchFailed) => {
            if matches!(slots.get(key), Some(Slot::Pending(pending, _)) if *pending == id) {
                slots.remove(key);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::error::RegistryError;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    /// Scripted registry fake tracking call counts, in the spirit of a
    /// hand-rolled storer mock.
    #[derive(Default)]
    struct FakeRegistry {
        latest_calls: AtomicUsize,
        advisory_calls: AtomicUsize,
        delay_ms: u64,
        missing: bool,
        fail_always: bool,
        fail_once: AtomicBool,
    }

    impl FakeRegistry {
        fn with_delay(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl NpmRegistryApi for FakeRegistry {
        async fn latest_version(
            &self,
            _package_name: &str,
        ) -> Result<Option<String>, RegistryError> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_always || self.fail_once.swap(false, Ordering::SeqCst) {
                return Err(RegistryError::UnexpectedStatus(500));
            }
            if self.missing {
                return Ok(None);
            }
            Ok(Some("2.0.0".to_string()))
        }

        async fn advisories(
            &self,
            _package_name: &str,
            _version: &str,
        ) -> Result<Vec<Advisory>, RegistryError> {
            self.advisory_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_always {
                return Err(RegistryError::UnexpectedStatus(500));
            }
            Ok(Vec::new())
        }
    }

    fn cache_over(registry: Arc<FakeRegistry>) -> QueryCache {
        QueryCache::new(registry)
    }

    #[tokio::test]
    async fn repeated_lookups_fetch_once() {
        let registry = Arc::new(FakeRegistry::default());
        let cache = cache_over(registry.clone());

        assert_eq!(cache.latest_version("axios").await, Some("2.0.0".into()));
        assert_eq!(cache.latest_version("axios").await, Some("2.0.0".into()));

        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_fetch() {
        let registry = Arc::new(FakeRegistry::with_delay(50));
        let cache = cache_over(registry.clone());

        let (first, second) =
            tokio::join!(cache.latest_version("axios"), cache.latest_version("axios"));

        assert_eq!(first, Some("2.0.0".to_string()));
        assert_eq!(second, Some("2.0.0".to_string()));
        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_independently() {
        let registry = Arc::new(FakeRegistry::default());
        let cache = cache_over(registry.clone());

        cache.latest_version("axios").await;
        cache.latest_version("lodash").await;

        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn confirmed_not_found_is_memoized() {
        let registry = Arc::new(FakeRegistry {
            missing: true,
            ..FakeRegistry::default()
        });
        let cache = cache_over(registry.clone());

        assert_eq!(cache.latest_version("ghost").await, None);
        assert_eq!(cache.latest_version("ghost").await, None);

        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_not_memoized() {
        let registry = Arc::new(FakeRegistry {
            fail_once: AtomicBool::new(true),
            ..FakeRegistry::default()
        });
        let cache = cache_over(registry.clone());

        // First pass degrades to no result; second pass retries and succeeds.
        assert_eq!(cache.latest_version("axios").await, None);
        assert_eq!(cache.latest_version("axios").await, Some("2.0.0".into()));

        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_advisory_list_is_memoized() {
        let registry = Arc::new(FakeRegistry::default());
        let cache = cache_over(registry.clone());

        assert!(cache.advisories("axios", "1.0.0").await.is_empty());
        assert!(cache.advisories("axios", "1.0.0").await.is_empty());

        assert_eq!(registry.advisory_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn advisory_keys_include_the_version() {
        let registry = Arc::new(FakeRegistry::default());
        let cache = cache_over(registry.clone());

        cache.advisories("axios", "1.0.0").await;
        cache.advisories("axios", "1.1.0").await;

        assert_eq!(registry.advisory_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn advisory_failure_degrades_to_empty_without_memoizing() {
        let registry = Arc::new(FakeRegistry {
            fail_always: true,
            ..FakeRegistry::default()
        });
        let cache = cache_over(registry.clone());

        assert!(cache.advisories("axios", "1.0.0").await.is_empty());
        assert!(cache.advisories("axios", "1.0.0").await.is_empty());

        assert_eq!(registry.advisory_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_a_new_fetch() {
        let registry = Arc::new(FakeRegistry::default());
        let cache = cache_over(registry.clone());

        cache.latest_version("axios").await;
        cache.clear();
        cache.latest_version("axios").await;

        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn result_arriving_after_clear_is_stored_into_empty_cache() {
        let registry = Arc::new(FakeRegistry::with_delay(50));
        let cache = cache_over(registry.clone());

        let lookup = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.latest_version("axios").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.clear();

        assert_eq!(lookup.await.unwrap(), Some("2.0.0".to_string()));

        // The settled result landed in the cleared cache: no second fetch.
        assert_eq!(cache.latest_version("axios").await, Some("2.0.0".into()));
        assert_eq!(registry.latest_calls.load(Ordering::SeqCst), 1);
    }
}
