//! core::cache
//!
//! Bounded metadata cache keyed by normalized logical path.
//!
//! # Architecture
//!
//! The cache is an optimization only. Values are computed on demand by a
//! loader, checked on every hit by a caller-supplied freshness predicate,
//! and removed explicitly by the engine after each mutation. All access,
//! including the loader and the predicate, runs inside one mutex, so
//! concurrent resolution of a path inside one process is serialized.
//!
//! When the cache reaches its capacity it is swept: snapshots nobody else
//! holds are dropped first, and if that frees nothing the map is cleared.
//!
//! Absence is never cached; a loader returning `None` leaves no trace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::Result;
use crate::core::info::RepositoryInfo;
use crate::core::paths::RepoPath;

/// Default number of cached snapshots.
pub const DEFAULT_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct MetadataCache {
    entries: Mutex<HashMap<RepoPath, Arc<RepositoryInfo>>>,
    capacity: usize,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RepoPath, Arc<RepositoryInfo>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached snapshot for `path` if `is_fresh` accepts it,
    /// otherwise run `load` and cache its result.
    pub fn resolve<F, L>(
        &self,
        path: &RepoPath,
        is_fresh: F,
        load: L,
    ) -> Result<Option<Arc<RepositoryInfo>>>
    where
        F: FnOnce(&RepositoryInfo) -> bool,
        L: FnOnce() -> Result<Option<RepositoryInfo>>,
    {
        let mut entries = self.entries();

        if let Some(cached) = entries.get(path) {
            if is_fresh(cached) {
                tracing::debug!(%path, "metadata cache hit");
                return Ok(Some(Arc::clone(cached)));
            }
            tracing::debug!(%path, "metadata cache entry stale");
            entries.remove(path);
        } else {
            tracing::debug!(%path, "metadata cache miss");
        }

        let Some(info) = load()? else {
            return Ok(None);
        };

        if entries.len() >= self.capacity {
            self.sweep(&mut entries);
        }
        let info = Arc::new(info);
        entries.insert(path.clone(), Arc::clone(&info));
        Ok(Some(info))
    }

    fn sweep(&self, entries: &mut HashMap<RepoPath, Arc<RepositoryInfo>>) {
        let before = entries.len();
        entries.retain(|_, info| Arc::strong_count(info) > 1);
        if entries.len() >= self.capacity {
            entries.clear();
        }
        tracing::debug!(before, after = entries.len(), "metadata cache swept");
    }

    /// Drop the snapshot for exactly `path`.
    pub fn invalidate(&self, path: &RepoPath) {
        self.entries().remove(path);
    }

    /// Drop the snapshots for `path` and everything beneath it.
    pub fn invalidate_prefix(&self, path: &RepoPath) {
        self.entries().retain(|key, _| !key.starts_with(path));
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::info::ContainerInfo;
    use std::cell::Cell;

    fn path(s: &str) -> RepoPath {
        RepoPath::parse(s).unwrap()
    }

    fn container(p: &str) -> RepositoryInfo {
        RepositoryInfo::Container(ContainerInfo {
            path: path(p),
            deleted: false,
            last_modified: None,
        })
    }

    #[test]
    fn loads_once_while_fresh() {
        let cache = MetadataCache::default();
        let loads = Cell::new(0);
        for _ in 0..3 {
            let info = cache
                .resolve(&path("a"), |_| true, || {
                    loads.set(loads.get() + 1);
                    Ok(Some(container("a")))
                })
                .unwrap();
            assert!(info.is_some());
        }
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn stale_entries_are_reloaded() {
        let cache = MetadataCache::default();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(Some(container("a")))
        };
        cache.resolve(&path("a"), |_| true, load).unwrap();
        cache.resolve(&path("a"), |_| false, load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn absence_is_not_cached() {
        let cache = MetadataCache::default();
        let info = cache.resolve(&path("a"), |_| true, || Ok(None)).unwrap();
        assert!(info.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_prefix_drops_subtree_only() {
        let cache = MetadataCache::default();
        for p in ["a", "a/b", "a/b/c", "ab"] {
            cache
                .resolve(&path(p), |_| true, || Ok(Some(container(p))))
                .unwrap();
        }
        cache.invalidate_prefix(&path("a"));
        assert_eq!(cache.len(), 1);

        cache.invalidate(&path("ab"));
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_keeps_size_bounded() {
        let cache = MetadataCache::new(4);
        let mut held = Vec::new();
        for i in 0..10 {
            let p = format!("n{i}");
            let info = cache
                .resolve(&path(&p), |_| true, || Ok(Some(container(&p))))
                .unwrap()
                .unwrap();
            if i < 2 {
                held.push(info);
            }
        }
        assert!(cache.len() <= cache.capacity());
        assert_eq!(held.len(), 2);
    }

    #[test]
    fn sweep_prefers_unreferenced_snapshots() {
        let cache = MetadataCache::new(2);
        let held = cache
            .resolve(&path("kept"), |_| true, || Ok(Some(container("kept"))))
            .unwrap()
            .unwrap();
        cache
            .resolve(&path("dropped"), |_| true, || Ok(Some(container("dropped"))))
            .unwrap();
        cache
            .resolve(&path("new"), |_| true, || Ok(Some(container("new"))))
            .unwrap();

        let loads = Cell::new(0);
        cache
            .resolve(&path("kept"), |_| true, || {
                loads.set(loads.get() + 1);
                Ok(Some(container("kept")))
            })
            .unwrap();
        assert_eq!(loads.get(), 0);
        drop(held);
    }

    #[test]
    fn loader_errors_propagate() {
        let cache = MetadataCache::default();
        let result = cache.resolve(&path("a"), |_| true, || {
            Err(crate::core::error::RepositoryError::corrupt("a", "bad"))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
