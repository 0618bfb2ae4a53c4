//! Path-keyed cache with single-flight population.
//!
//! # Design
//! - Entries expire after an absolute lifetime or after sitting idle past the
//!   sliding window, whichever comes first. Reads refresh the sliding window.
//! - The entry count is bounded; expired and evicted entries are reclaimed by
//!   the cache's own maintenance rather than on the next read of the same key.
//! - Concurrent misses for one key share a single computation. Failed or
//!   cancelled computations store nothing, so the next caller computes again.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use moka::future::Cache;

/// TTL cache keyed by filesystem path.
pub struct PathCache<V = bool> {
    entries: Cache<PathBuf, V>,
}

impl<V: Clone + Send + Sync + 'static> PathCache<V> {
    /// Build a cache holding at most `max_entries` values with the given
    /// absolute and sliding lifetimes.
    #[must_use]
    pub fn new(max_entries: u64, absolute_ttl: Duration, sliding_ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(absolute_ttl)
                .time_to_idle(sliding_ttl)
                .build(),
        }
    }

    /// Fetch a live value, refreshing its sliding window.
    pub async fn get(&self, key: &Path) -> Option<V> {
        self.entries.get(key).await
    }

    /// Store a value, replacing any previous entry.
    pub async fn insert(&self, key: PathBuf, value: V) {
        self.entries.insert(key, value).await;
    }

    /// Return the cached value for `key`, running `init` on a miss.
    ///
    /// Concurrent callers for the same key wait for the first one. The boolean
    /// is `true` when this call ran `init`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `init`, shared with every caller that
    /// waited on it; nothing is cached in that case.
    pub async fn get_or_try_insert_with<Fut, E>(
        &self,
        key: &Path,
        init: Fut,
    ) -> Result<(V, bool), Arc<E>>
    where
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send + Sync + 'static,
    {
        let computed = AtomicBool::new(false);
        let value = self
            .entries
            .try_get_with(key.to_path_buf(), async {
                computed.store(true, Ordering::Relaxed);
                init.await
            })
            .await?;
        Ok((value, computed.into_inner()))
    }

    /// Drop one entry.
    pub async fn remove(&self, key: &Path) -> bool {
        let present = self.entries.contains_key(key);
        self.entries.invalidate(key).await;
        present
    }

    /// Drop every entry whose key lies under `prefix`.
    pub async fn remove_prefix(&self, prefix: &Path) -> usize {
        let doomed = self.matching_keys(|key| key.starts_with(prefix));
        self.invalidate_keys(&doomed).await
    }

    /// Drop entries for `path`, its ancestors and its descendants.
    pub async fn invalidate_related(&self, path: &Path) -> usize {
        let doomed = self.matching_keys(|key| key.starts_with(path) || path.starts_with(key));
        self.invalidate_keys(&doomed).await
    }

    /// Drop everything, returning how many live entries were held.
    pub async fn clear(&self) -> usize {
        let count = self.entries.iter().count();
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        count
    }

    /// Number of live entries once pending maintenance has run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn matching_keys(&self, matches: impl Fn(&Path) -> bool) -> Vec<Arc<PathBuf>> {
        self.entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| matches(key.as_path()))
            .collect()
    }

    async fn invalidate_keys(&self, keys: &[Arc<PathBuf>]) -> usize {
        for key in keys {
            self.entries.invalidate(key.as_path()).await;
        }
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const LONG: Duration = Duration::from_secs(60);
    const CAPACITY: u64 = 1_024;

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() -> anyhow::Result<()> {
        let cache: PathCache = PathCache::new(CAPACITY, LONG, LONG);
        let key = Path::new("/vfs/Demo [sid=200]");
        let (first, computed) = cache
            .get_or_try_insert_with(key, async { Ok::<_, std::io::Error>(true) })
            .await?;
        assert!(first && computed);

        let (second, computed) = cache
            .get_or_try_insert_with(key, async {
                Err::<bool, _>(std::io::Error::other("should not run"))
            })
            .await?;
        assert!(second);
        assert!(!computed);
        Ok(())
    }

    #[tokio::test]
    async fn failures_are_not_cached() -> anyhow::Result<()> {
        let cache: PathCache = PathCache::new(CAPACITY, LONG, LONG);
        let key = Path::new("/vfs");
        let failed = cache
            .get_or_try_insert_with(key, async {
                Err::<bool, _>(std::io::Error::other("catalog offline"))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(key).await.is_none());

        let (value, computed) = cache
            .get_or_try_insert_with(key, async { Ok::<_, std::io::Error>(true) })
            .await?;
        assert!(value && computed);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_compute_once() -> anyhow::Result<()> {
        let cache: Arc<PathCache> = Arc::new(PathCache::new(CAPACITY, LONG, LONG));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with(Path::new("/vfs/show"), async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, std::io::Error>(true)
                    })
                    .await
            }));
        }
        for handle in handles {
            let (value, _) = handle.await??;
            assert!(value);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_flight_lets_the_next_caller_compute() -> anyhow::Result<()> {
        let cache: Arc<PathCache> = Arc::new(PathCache::new(CAPACITY, LONG, LONG));
        let stalled = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_try_insert_with(Path::new("/vfs/slow"), async {
                        tokio::time::sleep(LONG).await;
                        Ok::<_, std::io::Error>(true)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        stalled.abort();
        assert!(stalled.await.is_err());

        let (value, computed) = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_try_insert_with(Path::new("/vfs/slow"), async {
                Ok::<_, std::io::Error>(false)
            }),
        )
        .await??;
        assert!(!value);
        assert!(computed);
        Ok(())
    }

    #[tokio::test]
    async fn entries_expire_after_idle_window() {
        let cache: PathCache = PathCache::new(CAPACITY, LONG, Duration::from_millis(30));
        cache.insert(PathBuf::from("/vfs/a"), true).await;
        assert_eq!(cache.get(Path::new("/vfs/a")).await, Some(true));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(Path::new("/vfs/a")).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn entries_expire_after_absolute_lifetime_despite_reads() {
        let cache: PathCache = PathCache::new(CAPACITY, Duration::from_millis(80), LONG);
        cache.insert(PathBuf::from("/vfs/a"), true).await;
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(cache.get(Path::new("/vfs/a")).await, Some(true));
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(Path::new("/vfs/a")).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_reclaimed_without_reads() {
        let cache: PathCache = PathCache::new(CAPACITY, Duration::from_millis(40), LONG);
        for index in 0..32 {
            cache
                .insert(PathBuf::from(format!("/vfs/poster-{index}.jpg")), true)
                .await;
        }
        assert_eq!(cache.len().await, 32);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn entry_count_stays_within_capacity() {
        let cache: PathCache = PathCache::new(4, LONG, LONG);
        for index in 0..64 {
            cache
                .insert(PathBuf::from(format!("/vfs/show-{index}")), true)
                .await;
        }
        assert!(cache.len().await <= 4);
    }

    #[tokio::test]
    async fn invalidation_targets_related_keys() {
        let cache: PathCache = PathCache::new(CAPACITY, LONG, LONG);
        for key in [
            "/vfs",
            "/vfs/Demo [sid=200]",
            "/vfs/Demo [sid=200]/Season 01",
            "/vfs/Other [sid=300]",
            "/other",
        ] {
            cache.insert(PathBuf::from(key), true).await;
        }
        assert_eq!(
            cache
                .invalidate_related(Path::new("/vfs/Demo [sid=200]"))
                .await,
            3
        );
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.remove_prefix(Path::new("/vfs")).await, 1);
        assert!(cache.remove(Path::new("/other")).await);
        assert!(!cache.remove(Path::new("/other")).await);
        assert_eq!(cache.clear().await, 0);
    }
}
