//! engine::containers
//!
//! Container operations: mkdir, rmdir, listing and existence checks.
//!
//! # Tombstones
//!
//! Without an attic, a container whose children are all deleted cannot be
//! removed physically (the deleted entries still hold history). It is
//! renamed to `_d<name>` instead and `mkdir` brings it back by renaming it
//! again.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::Repository;
use crate::core::error::{IoContext, RepositoryError, Result};
use crate::core::info::RepositoryInfo;
use crate::core::naming::{self, deleted_dir_name, entry_folder_name, escape_name, ChildName};
use crate::core::paths::RepoPath;
use crate::core::storage::Container;

impl<C: Container> Repository<C> {
    /// Create container `name` inside `parent`.
    ///
    /// Returns `true` if the container was created or resurrected from a
    /// tombstone, `false` if it already existed or `parent` is missing or
    /// deleted.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidName`] for a bad name,
    /// [`RepositoryError::NotAContainer`] if `parent` is an entry and
    /// [`RepositoryError::Rejected`] if an entry already uses `name`.
    pub fn mkdir(&self, parent: &str, name: &str) -> Result<bool> {
        naming::check_name(name)?;
        let parent_path = RepoPath::parse(parent)?;
        let path = parent_path.join_unchecked(name);

        match self.resolve(&parent_path)? {
            None => return Ok(false),
            Some(info) if info.is_entry() => {
                return Err(RepositoryError::NotAContainer(parent_path.to_string()))
            }
            Some(info) if info.is_deleted() => return Ok(false),
            Some(_) => {}
        }

        let physical = self.physical_container(&parent_path);
        if physical.child(&entry_folder_name(name)).exists() {
            return Err(RepositoryError::rejected(
                path.to_string(),
                "an entry with that name exists",
            ));
        }

        let live = physical.child(&escape_name(name));
        if live.exists() {
            return Ok(false);
        }

        let tombstone = physical.child(&deleted_dir_name(name));
        let created = if tombstone.exists() {
            let revived = tombstone
                .rename_to(&live)
                .io_context(|| format!("cannot rename '{}'", tombstone.location()))?;
            if revived {
                debug!(%path, "resurrected container");
            }
            revived
        } else {
            live.create()
                .io_context(|| format!("cannot create '{}'", live.location()))?
        };

        self.invalidate_tree(&path);
        if created {
            debug!(%path, "created container");
            self.mirror_mkdir(&path);
        }
        Ok(created)
    }

    /// Remove a container.
    ///
    /// An empty container is removed physically. Without an attic, a
    /// container holding only deleted entries and tombstoned containers is
    /// tombstoned instead. Returns `false` if neither applies.
    pub fn rmdir(&self, path: &str) -> Result<bool> {
        let path = RepoPath::parse(path)?;
        if path.is_root() {
            return Err(RepositoryError::rejected(
                path.to_string(),
                "cannot remove the repository root",
            ));
        }

        let info = self.require(&path)?;
        match &*info {
            RepositoryInfo::Entry(_) => return Err(RepositoryError::NotAContainer(path.to_string())),
            RepositoryInfo::Container(c) if c.deleted => {
                return Err(RepositoryError::no_entry(path.to_string(), "is already deleted"))
            }
            RepositoryInfo::Container(_) => {}
        }

        let dir = self.physical_container(&path);
        let mut removed = dir
            .remove()
            .io_context(|| format!("cannot remove '{}'", dir.location()))?;

        if !removed && self.attic.is_none() && self.all_children_deleted(&dir, &path)? {
            let (parent, name) = self.physical_parent(&path)?;
            let tombstone = parent.child(&deleted_dir_name(name));
            match dir.rename_to(&tombstone) {
                Ok(true) => {
                    debug!(%path, "tombstoned container");
                    removed = true;
                }
                Ok(false) => warn!(%path, "tombstone already exists, container kept"),
                Err(e) => warn!(%path, error = %e, "cannot tombstone container"),
            }
        }

        if removed {
            self.invalidate_tree(&path);
            self.mirror_rmdir(&path);
        }
        Ok(removed)
    }

    /// Whether every child of a physical container is deleted.
    fn all_children_deleted(&self, dir: &C, path: &RepoPath) -> Result<bool> {
        let names = dir
            .list()
            .io_context(|| format!("cannot list '{}'", dir.location()))?;

        for physical in names {
            match ChildName::classify(&physical) {
                ChildName::Entry(name) => {
                    let folder = dir.child(&physical);
                    let child = path.join_unchecked(&name);
                    match self.read_record(&folder, &child)? {
                        Some((record, _)) if record.deleted => {}
                        _ => return Ok(false),
                    }
                }
                ChildName::DeletedContainer(_) => {}
                ChildName::Container(_) => return Ok(false),
                ChildName::Unknown(name) => {
                    error!(%path, name, "unexpected name in container");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Whether `path` names a live container or a non-deleted entry.
    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = RepoPath::parse(path)?;
        Ok(self.resolve(&path)?.is_some_and(|info| !info.is_deleted()))
    }

    /// Whether `path` names a non-deleted entry.
    pub fn exists_entry(&self, path: &str) -> Result<bool> {
        let path = RepoPath::parse(path)?;
        Ok(self
            .resolve(&path)?
            .is_some_and(|info| info.is_entry() && !info.is_deleted()))
    }

    /// Metadata of `path`, including deleted nodes. `None` if absent.
    pub fn information(&self, path: &str) -> Result<Option<Arc<RepositoryInfo>>> {
        let path = RepoPath::parse(path)?;
        self.resolve(&path)
    }

    /// Children of a live container, deleted ones included, sorted by name.
    pub fn entries(&self, path: &str) -> Result<Vec<Arc<RepositoryInfo>>> {
        let path = RepoPath::parse(path)?;
        self.require_live_container(&path)?;

        let dir = self.physical_container(&path);
        let names = dir
            .list()
            .io_context(|| format!("cannot list '{}'", dir.location()))?;

        let mut children = Vec::with_capacity(names.len());
        for physical in names {
            let name = match ChildName::classify(&physical) {
                ChildName::Unknown(name) => {
                    warn!(%path, name, "skipping unexpected name");
                    continue;
                }
                known => known.name().to_string(),
            };
            if naming::check_name(&name).is_err() {
                warn!(%path, name, "skipping invalid name");
                continue;
            }
            if let Some(info) = self.resolve(&path.join_unchecked(&name))? {
                children.push(info);
            }
        }

        children.sort_by(|a, b| a.name().cmp(b.name()));
        children.dedup_by(|a, b| a.path() == b.path());
        Ok(children)
    }

    /// Validate a single name.
    pub fn check_name(&self, name: &str) -> Result<()> {
        naming::check_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{MemoryContainer, MemoryStore};
    use crate::engine::RepositoryOptions;

    fn repo() -> (MemoryStore, Repository<MemoryContainer>) {
        let store = MemoryStore::new();
        let repo = Repository::open(store.root()).unwrap();
        (store, repo)
    }

    #[test]
    fn mkdir_creates_once() {
        let (store, repo) = repo();
        assert!(repo.mkdir("", "docs").unwrap());
        assert!(!repo.mkdir("/", "docs").unwrap());
        assert!(repo.mkdir("docs", "_private").unwrap());
        assert!(store.root().child("docs").child("__private").exists());
        assert!(repo.exists("docs/_private").unwrap());
    }

    #[test]
    fn mkdir_under_missing_parent_returns_false() {
        let (_store, repo) = repo();
        assert!(!repo.mkdir("nowhere", "docs").unwrap());
    }

    #[test]
    fn mkdir_rejects_entry_collisions() {
        let (_store, repo) = repo();
        repo.create_bytes("alice", "a", b"x").unwrap();
        assert!(matches!(
            repo.mkdir("", "a"),
            Err(RepositoryError::Rejected { .. })
        ));
        assert!(matches!(
            repo.mkdir("a", "sub"),
            Err(RepositoryError::NotAContainer(_))
        ));
        assert!(matches!(
            repo.mkdir("", "a|b"),
            Err(RepositoryError::InvalidName(_))
        ));
    }

    #[test]
    fn rmdir_removes_empty_container() {
        let (store, repo) = repo();
        repo.mkdir("", "docs").unwrap();
        assert!(repo.rmdir("docs").unwrap());
        assert!(!repo.exists("docs").unwrap());
        assert!(!store.root().child("docs").exists());
        assert!(repo.information("docs").unwrap().is_none());
    }

    #[test]
    fn rmdir_keeps_live_children() {
        let (_store, repo) = repo();
        repo.mkdir("", "docs").unwrap();
        repo.create_bytes("alice", "docs/a", b"x").unwrap();
        assert!(!repo.rmdir("docs").unwrap());
        assert!(repo.exists("docs").unwrap());
    }

    #[test]
    fn rmdir_tombstones_and_mkdir_resurrects() {
        let (store, repo) = repo();
        repo.mkdir("", "docs").unwrap();
        repo.create_bytes("alice", "docs/a", b"x").unwrap();
        repo.unlock("alice", "docs/a").unwrap();
        repo.delete("alice", "docs/a", false).unwrap();

        assert!(repo.rmdir("docs").unwrap());
        assert!(store.root().child("_ddocs").exists());
        assert!(!repo.exists("docs").unwrap());
        let info = repo.information("docs").unwrap().unwrap();
        assert!(info.is_container() && info.is_deleted());

        assert!(repo.rmdir("docs").unwrap_err().is_not_found());
        assert!(matches!(
            repo.entries("docs"),
            Err(RepositoryError::Rejected { .. })
        ));
        assert!(!repo.mkdir("docs", "sub").unwrap());

        assert!(repo.mkdir("", "docs").unwrap());
        assert!(repo.exists("docs").unwrap());
        assert_eq!(repo.get_revision_bytes("docs/a", 1).unwrap(), b"x");
    }

    #[test]
    fn rmdir_with_attic_does_not_tombstone() {
        let store = MemoryStore::new();
        store.container("repo").create().unwrap();
        let repo = Repository::open_with(
            store.container("repo"),
            RepositoryOptions::default().with_attic(store.container("attic")),
        )
        .unwrap();
        repo.mkdir("", "docs").unwrap();
        repo.create_bytes("alice", "docs/a", b"x").unwrap();
        repo.delete("alice", "docs/a", true).unwrap();
        // The entry moved to the attic, so the container is empty again
        assert!(repo.rmdir("docs").unwrap());
        assert!(!store.container("repo/_ddocs").exists());
    }

    #[test]
    fn rmdir_rejects_root_and_entries() {
        let (_store, repo) = repo();
        repo.create_bytes("alice", "a", b"x").unwrap();
        assert!(matches!(repo.rmdir("/"), Err(RepositoryError::Rejected { .. })));
        assert!(matches!(repo.rmdir("a"), Err(RepositoryError::NotAContainer(_))));
        assert!(repo.rmdir("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn unknown_children_block_tombstoning() {
        let (store, repo) = repo();
        repo.mkdir("", "docs").unwrap();
        store.root().child("docs").child("_x").create().unwrap();
        assert!(!repo.rmdir("docs").unwrap());
        assert!(repo.entries("docs").unwrap().is_empty());
    }

    #[test]
    fn entries_lists_all_kinds_sorted() {
        let (_store, repo) = repo();
        repo.mkdir("", "b-dir").unwrap();
        repo.mkdir("", "gone").unwrap();
        repo.rmdir("gone").unwrap();
        repo.create_bytes("alice", "a.txt", b"x").unwrap();
        repo.create_bytes("alice", "c.txt", b"x").unwrap();
        repo.unlock("alice", "c.txt").unwrap();
        repo.delete("alice", "c.txt", false).unwrap();

        let listed = repo.entries("").unwrap();
        let names: Vec<&str> = listed.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["a.txt", "b-dir", "c.txt"]);
        assert!(listed[0].is_entry());
        assert!(listed[1].is_container());
        assert!(listed[2].is_deleted());
    }

    #[test]
    fn exists_variants() {
        let (_store, repo) = repo();
        repo.mkdir("", "docs").unwrap();
        repo.create_bytes("alice", "docs/a", b"x").unwrap();
        assert!(repo.exists("docs").unwrap());
        assert!(!repo.exists_entry("docs").unwrap());
        assert!(repo.exists_entry("docs/a").unwrap());
        assert!(!repo.exists("docs/b").unwrap());
        assert!(repo.exists("/").unwrap());
        assert!(repo.check_name("ok").is_ok());
        assert!(repo.check_name("not?ok").is_err());
    }
}
