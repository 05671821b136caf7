//! Bulk cache prewarm with a bounded worker pool

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tracing::debug;

use crate::version::cache::QueryCache;

/// Warms the latest-version cache for `names` using a fixed pool of
/// `concurrency` workers, so at most that many fetches are in flight at
/// once.
///
/// Workers claim the next unclaimed index from a shared cursor rather than
/// owning a slice up front, so a slow or failing name never idles more
/// than one worker. Returns only after every name has been claimed and
/// every worker has exited; individual fetch failures are swallowed. The
/// only effect is a warmed cache.
pub async fn prewarm_packages(cache: &QueryCache, names: &[String], concurrency: usize) {
    if names.is_empty() || concurrency == 0 {
        return;
    }

    let cursor = AtomicUsize::new(0);
    let workers = (0..concurrency.min(names.len())).map(|_| {
        let cursor = &cursor;
        async move {
            loop {
                // Claiming is a single atomic step; two workers can never
                // observe the same index.
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(name) = names.get(index) else {
                    break;
                };
                let _ = cache.latest_version(name).await;
            }
        }
    });

    join_all(workers).await;
    debug!("prewarmed {} package names", names.len());
}
