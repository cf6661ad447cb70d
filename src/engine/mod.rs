//! engine
//!
//! The repository engine: path resolution, the metadata cache, and the
//! protocols that mutate entries and containers.
//!
//! # Architecture
//!
//! [`Repository`] is generic over a storage [`Container`] and never touches
//! the filesystem directly. Operations are split by concern:
//!
//! - [`entries`] - get / create / lock / unlock / delete and history
//! - [`containers`] - mkdir / rmdir / listing / existence
//! - [`mirror`] - work-area mirror, attic relocation, export
//!
//! # Resolution
//!
//! A logical path resolves by probing its parent's physical container for,
//! in order, the entry folder `_f<name>`, the tombstone `_d<name>` and the
//! plain container `<name>`. Results are cached per path. A cached entry is
//! fresh while the change stamp of its metadata record is unchanged; a
//! cached container is fresh while its expected physical directory exists.
//! Every mutation invalidates the affected paths explicitly.
//!
//! # Invariants
//!
//! - Record read-modify-write always happens under the entry folder's
//!   [`Container::lock`] guard, on a freshly read record
//! - Revision content is streamed outside that guard
//! - Work-area and attic failures are logged and never fail the primary
//!   operation, except attic relocation itself
//!
//! # Example
//!
//! ```
//! use revrepo::core::storage::MemoryStore;
//! use revrepo::engine::Repository;
//!
//! let store = MemoryStore::new();
//! let repo = Repository::open(store.root()).unwrap();
//!
//! assert!(repo.mkdir("", "docs").unwrap());
//! assert_eq!(repo.create_bytes("alice", "/docs/a.txt", b"v1").unwrap(), 1);
//! assert!(repo.unlock("alice", "/docs/a.txt").unwrap());
//! assert_eq!(repo.get_current_revision_num("bob", "/docs/a.txt").unwrap(), 1);
//! ```

pub mod containers;
pub mod entries;
pub mod mirror;

pub use entries::RevisionWriter;
pub use mirror::ExportStats;

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::cache::{MetadataCache, DEFAULT_CAPACITY};
use crate::core::error::{IoContext, RepositoryError, Result};
use crate::core::info::{timestamp, ContainerInfo, EntryInfo, RepositoryInfo};
use crate::core::naming::{deleted_dir_name, entry_folder_name, escape_name, RECORD_NAME};
use crate::core::paths::RepoPath;
use crate::core::record::EntryRecord;
use crate::core::storage::{Container, Leaf, Stamp};

/// Optional parts of a repository.
#[derive(Debug, Clone)]
pub struct RepositoryOptions<C> {
    /// Mirror of released top revisions
    pub work_area: Option<C>,
    /// Relocation target for deleted entries
    pub attic: Option<C>,
    /// Users allowed to unlock entries held by others
    pub superusers: HashSet<String>,
    /// Metadata cache bound
    pub cache_capacity: usize,
}

impl<C> Default for RepositoryOptions<C> {
    fn default() -> Self {
        Self {
            work_area: None,
            attic: None,
            superusers: HashSet::new(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl<C> RepositoryOptions<C> {
    pub fn with_work_area(mut self, work_area: C) -> Self {
        self.work_area = Some(work_area);
        self
    }

    pub fn with_attic(mut self, attic: C) -> Self {
        self.attic = Some(attic);
        self
    }

    pub fn with_superuser(mut self, user: impl Into<String>) -> Self {
        self.superusers.insert(user.into());
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// A versioned, lockable object repository over a storage substrate.
#[derive(Debug)]
pub struct Repository<C: Container> {
    root: C,
    work_area: Option<C>,
    attic: Option<C>,
    superusers: HashSet<String>,
    cache: MetadataCache,
}

impl<C: Container> Repository<C> {
    /// Open a repository rooted at an existing container.
    pub fn open(root: C) -> Result<Self> {
        Self::open_with(root, RepositoryOptions::default())
    }

    /// Open a repository with a work area, an attic or superusers.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NoEntry`] if the root container does not
    /// exist. A missing work area or attic is created.
    pub fn open_with(root: C, options: RepositoryOptions<C>) -> Result<Self> {
        if !root.exists() {
            return Err(RepositoryError::no_entry(
                root.location(),
                "repository root does not exist",
            ));
        }
        for aux in options.work_area.iter().chain(options.attic.iter()) {
            aux.create_all()
                .io_context(|| format!("cannot create '{}'", aux.location()))?;
        }

        tracing::debug!(
            root = %root.location(),
            work_area = ?options.work_area.as_ref().map(Container::location),
            attic = ?options.attic.as_ref().map(Container::location),
            "opened repository"
        );

        Ok(Self {
            root,
            work_area: options.work_area,
            attic: options.attic,
            superusers: options.superusers,
            cache: MetadataCache::new(options.cache_capacity),
        })
    }

    pub fn root(&self) -> &C {
        &self.root
    }

    pub fn work_area(&self) -> Option<&C> {
        self.work_area.as_ref()
    }

    pub fn attic(&self) -> Option<&C> {
        self.attic.as_ref()
    }

    pub fn is_superuser(&self, user: &str) -> bool {
        self.superusers.contains(user)
    }

    /// Drop every cached snapshot.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // =========================================================================
    // Physical mapping
    // =========================================================================

    /// Physical container of a live container path.
    pub(crate) fn physical_container(&self, path: &RepoPath) -> C {
        path.segments()
            .fold(self.root.clone(), |node, name| node.child(&escape_name(name)))
    }

    /// Physical parent container and name of a non-root path.
    pub(crate) fn physical_parent<'p>(&self, path: &'p RepoPath) -> Result<(C, &'p str)> {
        match (path.parent(), path.name()) {
            (Some(parent), Some(name)) => Ok((self.physical_container(&parent), name)),
            _ => Err(RepositoryError::NotAnEntry(path.to_string())),
        }
    }

    /// Revision folder of an entry path (it need not exist).
    pub(crate) fn entry_folder(&self, path: &RepoPath) -> Result<C> {
        let (parent, name) = self.physical_parent(path)?;
        Ok(parent.child(&entry_folder_name(name)))
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a path through the cache. `None` if nothing lives there.
    pub(crate) fn resolve(&self, path: &RepoPath) -> Result<Option<Arc<RepositoryInfo>>> {
        self.cache
            .resolve(path, |cached| self.is_fresh(cached), || self.load(path))
    }

    /// Resolve a path that must exist.
    pub(crate) fn require(&self, path: &RepoPath) -> Result<Arc<RepositoryInfo>> {
        self.resolve(path)?
            .ok_or_else(|| RepositoryError::no_entry(path.to_string(), "does not exist"))
    }

    /// Resolve a path that must be an entry.
    pub(crate) fn require_entry(&self, path: &RepoPath) -> Result<EntryInfo> {
        match &*self.require(path)? {
            RepositoryInfo::Entry(entry) => Ok(entry.clone()),
            RepositoryInfo::Container(_) => Err(RepositoryError::NotAnEntry(path.to_string())),
        }
    }

    /// Resolve a path that must be a live container.
    pub(crate) fn require_live_container(&self, path: &RepoPath) -> Result<ContainerInfo> {
        match &*self.require(path)? {
            RepositoryInfo::Container(c) if c.deleted => Err(RepositoryError::rejected(
                path.to_string(),
                "already deleted (use mkdir to recreate)",
            )),
            RepositoryInfo::Container(c) => Ok(c.clone()),
            RepositoryInfo::Entry(_) => Err(RepositoryError::NotAContainer(path.to_string())),
        }
    }

    fn load(&self, path: &RepoPath) -> Result<Option<RepositoryInfo>> {
        let Some((parent, name)) = path.parent().zip(path.name()) else {
            return Ok(Some(RepositoryInfo::Container(ContainerInfo {
                path: RepoPath::root(),
                deleted: false,
                last_modified: self.root.modified().ok().map(timestamp),
            })));
        };
        let parent = self.physical_container(&parent);

        let folder = parent.child(&entry_folder_name(name));
        if folder.exists() {
            return Ok(self
                .read_record(&folder, path)?
                .map(|(record, stamp)| {
                    RepositoryInfo::Entry(EntryInfo::new(path.clone(), record, stamp))
                }));
        }

        for (physical, deleted) in [(deleted_dir_name(name), true), (escape_name(name), false)] {
            let dir = parent.child(&physical);
            if dir.exists() {
                return Ok(Some(RepositoryInfo::Container(ContainerInfo {
                    path: path.clone(),
                    deleted,
                    last_modified: dir.modified().ok().map(timestamp),
                })));
            }
        }

        Ok(None)
    }

    fn is_fresh(&self, cached: &RepositoryInfo) -> bool {
        match cached {
            RepositoryInfo::Entry(entry) => self
                .entry_folder(&entry.path)
                .ok()
                .and_then(|folder| folder.leaf(RECORD_NAME).stamp().ok().flatten())
                .is_some_and(|stamp| stamp == entry.stamp),
            RepositoryInfo::Container(c) => {
                let (Some(parent), Some(name)) = (c.path.parent(), c.path.name()) else {
                    return true;
                };
                let parent = self.physical_container(&parent);
                let physical = if c.deleted {
                    deleted_dir_name(name)
                } else {
                    escape_name(name)
                };
                parent.child(&physical).exists() && !parent.child(&entry_folder_name(name)).exists()
            }
        }
    }

    // =========================================================================
    // Metadata record
    // =========================================================================

    /// Read an entry's record. `None` while the folder holds no record yet.
    pub(crate) fn read_record(
        &self,
        folder: &C,
        path: &RepoPath,
    ) -> Result<Option<(EntryRecord, Stamp)>> {
        let leaf = folder.leaf(RECORD_NAME);
        let Some(stamp) = leaf
            .stamp()
            .io_context(|| format!("cannot stat '{}'", leaf.location()))?
        else {
            return Ok(None);
        };
        let bytes = match leaf.read_all() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RepositoryError::io(
                    format!("cannot read '{}'", leaf.location()),
                    e,
                ))
            }
        };
        let record = EntryRecord::decode(&bytes)
            .map_err(|e| RepositoryError::corrupt(path.to_string(), e.to_string()))?;
        Ok(Some((record, stamp)))
    }

    /// Read an entry's record, which must exist.
    pub(crate) fn read_existing_record(&self, folder: &C, path: &RepoPath) -> Result<EntryRecord> {
        self.read_record(folder, path)?
            .map(|(record, _)| record)
            .ok_or_else(|| RepositoryError::no_entry(path.to_string(), "does not exist"))
    }

    /// Rewrite an entry's record as a whole.
    pub(crate) fn write_record(
        &self,
        folder: &C,
        path: &RepoPath,
        record: &EntryRecord,
    ) -> Result<()> {
        let bytes = record
            .encode()
            .map_err(|e| RepositoryError::rejected(path.to_string(), e.to_string()))?;
        let leaf = folder.leaf(RECORD_NAME);
        leaf.replace(&bytes)
            .io_context(|| format!("cannot write '{}'", leaf.location()))?;
        tracing::debug!(
            %path,
            num_versions = record.num_versions,
            deleted = record.deleted,
            lock = ?record.lock,
            "wrote metadata record"
        );
        Ok(())
    }

    /// Take the exclusive guard of an entry folder.
    pub(crate) fn lock_folder(&self, folder: &C) -> Result<C::Guard> {
        folder
            .lock()
            .io_context(|| format!("cannot lock '{}'", folder.location()))
    }

    pub(crate) fn invalidate(&self, path: &RepoPath) {
        self.cache.invalidate(path);
    }

    pub(crate) fn invalidate_tree(&self, path: &RepoPath) {
        self.cache.invalidate_prefix(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStore;

    fn repo() -> (MemoryStore, Repository<crate::core::storage::MemoryContainer>) {
        let store = MemoryStore::new();
        let repo = Repository::open(store.root()).unwrap();
        (store, repo)
    }

    #[test]
    fn open_requires_existing_root() {
        let store = MemoryStore::new();
        let result = Repository::open(store.container("missing"));
        assert!(matches!(result, Err(RepositoryError::NoEntry { .. })));
    }

    #[test]
    fn open_creates_auxiliary_containers() {
        let store = MemoryStore::new();
        store.container("repo").create().unwrap();
        let options = RepositoryOptions::default()
            .with_work_area(store.container("work"))
            .with_attic(store.container("attic"))
            .with_superuser("admin");
        let repo = Repository::open_with(store.container("repo"), options).unwrap();
        assert!(store.container("work").exists());
        assert!(store.container("attic").exists());
        assert!(repo.is_superuser("admin"));
        assert!(!repo.is_superuser("alice"));
    }

    #[test]
    fn physical_mapping_escapes_segments() {
        let (_store, repo) = repo();
        let path = RepoPath::parse("_a/b/_c").unwrap();
        assert_eq!(repo.physical_container(&path).location(), "memory:/__a/b/__c");
        assert_eq!(
            repo.entry_folder(&path).unwrap().location(),
            "memory:/__a/b/_f__c"
        );
        assert!(repo.entry_folder(&RepoPath::root()).is_err());
    }

    #[test]
    fn resolve_probes_entry_then_tombstone_then_container() {
        let (store, repo) = repo();
        let root = store.root();
        root.child("plain").create().unwrap();
        root.child("_dgone").create().unwrap();

        let plain = repo.resolve(&RepoPath::parse("plain").unwrap()).unwrap().unwrap();
        assert!(plain.is_container());
        assert!(!plain.is_deleted());

        let gone = repo.resolve(&RepoPath::parse("gone").unwrap()).unwrap().unwrap();
        assert!(gone.is_container());
        assert!(gone.is_deleted());

        assert!(repo
            .resolve(&RepoPath::parse("missing").unwrap())
            .unwrap()
            .is_none());
        assert!(repo.resolve(&RepoPath::root()).unwrap().unwrap().is_container());
    }

    #[test]
    fn entry_folder_without_record_is_absent() {
        let (store, repo) = repo();
        store.root().child("_fhalf").create().unwrap();
        assert!(repo
            .resolve(&RepoPath::parse("half").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_record_is_reported() {
        let (store, repo) = repo();
        let folder = store.root().child("_fbad");
        folder.create().unwrap();
        folder.leaf(RECORD_NAME).replace(b"\x00\x00").unwrap();
        let err = repo
            .resolve(&RepoPath::parse("bad").unwrap())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { .. }));
    }

    #[test]
    fn external_record_change_refreshes_cache() {
        let (store, repo) = repo();
        repo.create_bytes("alice", "a", b"v1").unwrap();
        assert!(repo.require_entry(&RepoPath::parse("a").unwrap()).unwrap().is_in_update());

        let record = EntryRecord {
            num_versions: 1,
            author: "alice".into(),
            deleted: false,
            lock: crate::core::record::LockState::Unlocked,
        };
        store
            .root()
            .child("_fa")
            .leaf(RECORD_NAME)
            .replace(&record.encode().unwrap())
            .unwrap();

        let entry = repo.require_entry(&RepoPath::parse("a").unwrap()).unwrap();
        assert!(!entry.is_locked());
    }

    #[test]
    fn externally_removed_container_goes_stale() {
        let (store, repo) = repo();
        repo.mkdir("", "d").unwrap();
        assert!(repo.exists("d").unwrap());
        store.root().child("d").remove().unwrap();
        assert!(!repo.exists("d").unwrap());
    }
}
