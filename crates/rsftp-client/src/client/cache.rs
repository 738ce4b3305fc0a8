//! Time-bounded cache of remote directory listings.
//!
//! Keyed by absolute remote path. Readers check freshness under the read
//! lock; mutation takes the write lock. Population failures are never
//! cached, so a miss always degrades to a live query.

use std::collections::HashMap;
use std::sync::RwLock;

use rsftp_core::constants::DIR_CACHE_TTL;
use rsftp_core::RemoteEntry;
use tokio::time::Instant;

struct CacheEntry {
    entries: Vec<RemoteEntry>,
    cached_at: Instant,
}

/// Listing cache shared between the public operations and the directory
/// creation coordinator.
pub struct DirCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DirCache {
    pub fn new() -> Self {
        DirCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh entries for `path`, or None on a miss or a stale hit.
    pub fn get(&self, path: &str) -> Option<Vec<RemoteEntry>> {
        let map = self.entries.read().unwrap();
        let entry = map.get(path)?;
        (entry.cached_at.elapsed() < DIR_CACHE_TTL).then(|| entry.entries.clone())
    }

    pub fn insert(&self, path: &str, entries: Vec<RemoteEntry>) {
        self.entries.write().unwrap().insert(
            path.to_string(),
            CacheEntry {
                entries,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop one directory's entry.
    pub fn invalidate(&self, path: &str) {
        self.entries.write().unwrap().remove(path);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl Default for DirCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsftp_core::FileStat;
    use std::time::Duration;

    fn listing(names: &[&str]) -> Vec<RemoteEntry> {
        names
            .iter()
            .map(|n| RemoteEntry {
                name: n.to_string(),
                stat: FileStat::file(1),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_hit() {
        let cache = DirCache::new();
        cache.insert("/srv", listing(&["a", "b"]));
        tokio::time::advance(Duration::from_secs(29)).await;
        let hit = cache.get("/srv").unwrap();
        assert_eq!(hit.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_miss() {
        let cache = DirCache::new();
        cache.insert("/srv", listing(&["a"]));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("/srv").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_is_per_path() {
        let cache = DirCache::new();
        cache.insert("/srv", listing(&["a"]));
        cache.insert("/etc", listing(&["b"]));
        cache.invalidate("/srv");
        assert!(cache.get("/srv").is_none());
        assert!(cache.get("/etc").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = DirCache::new();
        cache.insert("/srv", listing(&["a"]));
        cache.insert("/etc", listing(&["b"]));
        cache.clear();
        assert!(cache.get("/srv").is_none());
        assert!(cache.get("/etc").is_none());
    }
}
