//! engine::mirror
//!
//! Everything that copies repository content somewhere else.
//!
//! # Work area
//!
//! The work area mirrors the released top revision of every entry under
//! plain (unescaped) names. It is updated when a provisional revision is
//! released, when an entry is deleted and when containers come and go.
//! Failures are logged and never fail the repository operation.
//!
//! # Attic
//!
//! With an attic configured, deleting an entry moves its whole revision
//! folder to `<attic>/<parent path>/<name>`. A name clash in the attic falls
//! back to `<name>.<uuid>`.
//!
//! # Export
//!
//! [`Repository::export`] copies the released top revision of every live
//! entry below a container into any other [`Container`], which may belong
//! to a different substrate.

use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::Repository;
use crate::core::error::{IoContext, RepositoryError, Result};
use crate::core::info::RepositoryInfo;
use crate::core::naming::revision_file_name;
use crate::core::paths::RepoPath;
use crate::core::storage::{Container, Leaf};

/// Counts of what an export wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub entries: usize,
    pub containers: usize,
}

impl<C: Container> Repository<C> {
    /// Work-area container and leaf name mirroring `path`.
    fn mirror_slot(&self, path: &RepoPath) -> Option<(C, String)> {
        let work_area = self.work_area.as_ref()?;
        let name = path.name()?;
        let parent = path.parent()?;
        Some((work_area.descend(parent.segments()), name.to_string()))
    }

    /// Copy a released revision into the work area.
    pub(crate) fn mirror_revision(&self, path: &RepoPath, folder: &C, revision: u32, author: &str) {
        let Some((dir, name)) = self.mirror_slot(path) else {
            return;
        };
        let source = folder.leaf(&revision_file_name(revision, false, author));
        let target = dir.leaf(&name);
        match dir.create_all().and_then(|()| source.copy_to(&target)) {
            Ok(bytes) => debug!(%path, revision, bytes, "mirrored revision"),
            Err(e) => error!(
                %path,
                revision,
                target = %target.location(),
                error = %e,
                "cannot update work area"
            ),
        }
    }

    /// Drop an entry's copy from the work area.
    pub(crate) fn mirror_remove(&self, path: &RepoPath) {
        let Some((dir, name)) = self.mirror_slot(path) else {
            return;
        };
        let target = dir.leaf(&name);
        match target.remove() {
            Ok(true) => debug!(%path, "removed work area copy"),
            Ok(false) => debug!(%path, "no work area copy to remove"),
            Err(e) => error!(
                %path,
                target = %target.location(),
                error = %e,
                "cannot remove work area copy"
            ),
        }
    }

    pub(crate) fn mirror_mkdir(&self, path: &RepoPath) {
        let Some(work_area) = &self.work_area else {
            return;
        };
        let dir = work_area.descend(path.segments());
        if let Err(e) = dir.create_all() {
            error!(%path, target = %dir.location(), error = %e, "cannot create work area container");
        }
    }

    /// Returns whether the mirrored container went away.
    pub(crate) fn mirror_rmdir(&self, path: &RepoPath) -> bool {
        let Some(work_area) = &self.work_area else {
            return false;
        };
        let dir = work_area.descend(path.segments());
        match dir.remove() {
            Ok(true) => true,
            Ok(false) => {
                warn!(%path, target = %dir.location(), "work area container is missing or not empty");
                false
            }
            Err(e) => {
                warn!(%path, target = %dir.location(), error = %e, "cannot remove work area container");
                false
            }
        }
    }

    /// Move an entry's revision folder into the attic.
    pub(crate) fn relocate_to_attic(&self, attic: &C, path: &RepoPath, folder: &C) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(RepositoryError::NotAnEntry(path.to_string()));
        };
        let dir = attic.descend(parent.segments());
        dir.create_all()
            .io_context(|| format!("cannot create '{}'", dir.location()))?;

        let candidates = [
            dir.child(name),
            dir.child(&format!("{name}.{}", Uuid::new_v4().simple())),
        ];
        for target in &candidates {
            let moved = folder
                .rename_to(target)
                .io_context(|| format!("cannot move '{}' to the attic", folder.location()))?;
            if moved {
                debug!(%path, target = %target.location(), "moved entry to attic");
                return Ok(());
            }
            debug!(%path, target = %target.location(), "attic slot taken");
        }

        Err(RepositoryError::rejected(
            path.to_string(),
            "no free slot in the attic",
        ))
    }

    /// Copy the released state below container `path` into `target`.
    ///
    /// Deleted entries, tombstoned containers and entries whose only
    /// revision is still provisional are skipped. Existing files in
    /// `target` are overwritten.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotAContainer`] if `target` does not exist.
    pub fn export<T: Container>(&self, path: &str, target: &T) -> Result<ExportStats> {
        let path = RepoPath::parse(path)?;
        if !target.exists() {
            return Err(RepositoryError::NotAContainer(target.location()));
        }
        let mut stats = ExportStats::default();
        self.export_into(&path, target, &mut stats)?;
        debug!(
            %path,
            target = %target.location(),
            entries = stats.entries,
            containers = stats.containers,
            "exported"
        );
        Ok(stats)
    }

    fn export_into<T: Container>(
        &self,
        path: &RepoPath,
        target: &T,
        stats: &mut ExportStats,
    ) -> Result<()> {
        for child in self.entries(path.as_str())? {
            let name = child.name();
            match &*child {
                RepositoryInfo::Container(c) if c.deleted => {}
                RepositoryInfo::Container(c) => {
                    let dir = target.child(name);
                    dir.create()
                        .io_context(|| format!("cannot create '{}'", dir.location()))?;
                    stats.containers += 1;
                    self.export_into(&c.path, &dir, stats)?;
                }
                RepositoryInfo::Entry(entry) => {
                    if entry.is_deleted() {
                        continue;
                    }
                    let released = entry.num_versions_for(None);
                    if released == 0 {
                        continue;
                    }
                    let folder = self.entry_folder(&entry.path)?;
                    let hint = (released == entry.num_versions()).then(|| entry.author());
                    let (version, leaf) =
                        self.find_revision(&folder, &entry.path, released, hint)?;
                    if version.deleted {
                        continue;
                    }
                    let out = target.leaf(name);
                    leaf.copy_to(&out)
                        .io_context(|| format!("cannot write '{}'", out.location()))?;
                    stats.entries += 1;
                }
            }
        }
        Ok(())
    }

    /// Refresh the work area below `path` from the repository.
    ///
    /// Files in the work area with no repository counterpart are left alone.
    pub fn rebuild_work_area(&self, path: &str) -> Result<ExportStats> {
        let Some(work_area) = &self.work_area else {
            return Err(RepositoryError::rejected(path, "no work area configured"));
        };
        let logical = RepoPath::parse(path)?;
        let dir = work_area.descend(logical.segments());
        dir.create_all()
            .io_context(|| format!("cannot create '{}'", dir.location()))?;
        self.export(logical.as_str(), &dir)
    }
}
