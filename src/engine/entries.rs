//! engine::entries
//!
//! Entry protocol: reading revisions, creating revisions, locking and
//! deletion.
//!
//! # Lock states
//!
//! ```text
//!              lock(u)                 create(u)
//!   Unlocked ----------> Locked(u) ---------------> InUpdate(u)
//!      ^                    |                           |  create(u): overwrite
//!      |     unlock(u)      |          unlock(u)        |  the provisional revision
//!      +--------------------+---------------------------+
//! ```
//!
//! Creating a new entry jumps straight to `InUpdate(u)` with revision 1.
//! A forced delete clears any lock.

use std::fmt;
use std::io::{self, Read, Write};

use tracing::{debug, warn};

use super::Repository;
use crate::core::error::{IoContext, RepositoryError, Result};
use crate::core::info::VersionInfo;
use crate::core::naming::{
    check_name, deleted_dir_name, escape_name, revision_file_name, RevisionName,
    RevisionNameError, DELETED_MARKER,
};
use crate::core::paths::RepoPath;
use crate::core::record::{EntryRecord, LockState};
use crate::core::storage::{Container, Leaf};

/// Streaming sink for a new revision, returned by
/// [`Repository::create_writer`].
///
/// The revision number is allocated when the writer is created. Call
/// [`RevisionWriter::finish`] to flush and surface write errors; dropping
/// the writer closes it silently.
pub struct RevisionWriter {
    inner: Box<dyn Write + Send>,
    revision: u32,
    location: String,
}

impl RevisionWriter {
    /// Revision number this writer fills.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Flush and close, returning the revision number.
    pub fn finish(self) -> Result<u32> {
        let Self {
            mut inner,
            revision,
            location,
        } = self;
        inner
            .flush()
            .io_context(|| format!("cannot write '{location}'"))?;
        Ok(revision)
    }
}

impl Write for RevisionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for RevisionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionWriter")
            .field("revision", &self.revision)
            .field("location", &self.location)
            .finish()
    }
}

/// User names end up in revision file names.
fn check_user(user: &str) -> Result<()> {
    check_name(user).map_err(|_| RepositoryError::InvalidName(format!("invalid user name '{user}'")))
}

impl<C: Container> Repository<C> {
    // =========================================================================
    // Reading
    // =========================================================================

    /// Revision count visible to `user`.
    ///
    /// A provisional top revision counts only for its lock holder.
    pub fn get_current_revision_num(&self, user: &str, path: &str) -> Result<u32> {
        let path = RepoPath::parse(path)?;
        Ok(self.require_entry(&path)?.num_versions_for(Some(user)))
    }

    /// Open the top revision as seen by `user`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NoEntry`] if the entry is deleted, or if its only
    /// revision is still provisional and `user` does not hold the lock.
    pub fn get(&self, user: &str, path: &str) -> Result<Box<dyn Read + Send>> {
        let path = RepoPath::parse(path)?;
        let entry = self.require_entry(&path)?;
        if entry.is_deleted() {
            return Err(RepositoryError::no_entry(path.to_string(), "is deleted"));
        }

        let visible = entry.num_versions_for(Some(user));
        if visible == 0 {
            return Err(RepositoryError::no_entry(
                path.to_string(),
                "initial revision not yet released",
            ));
        }

        let folder = self.entry_folder(&path)?;
        let hint = (visible == entry.num_versions()).then(|| entry.author());
        let (version, leaf) = self.find_revision(&folder, &path, visible, hint)?;
        if version.deleted {
            return Err(RepositoryError::no_entry(path.to_string(), "is deleted"));
        }
        open_reader(&leaf)
    }

    /// Read the top revision visible to `user` into memory.
    pub fn get_bytes(&self, user: &str, path: &str) -> Result<Vec<u8>> {
        read_to_end(self.get(user, path)?, path)
    }

    /// Open a specific revision, regardless of who reads it.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NoEntry`] if `version` is outside
    /// `1..=num_versions` or is a tombstone; [`RepositoryError::Corrupt`]
    /// if an in-range revision file is missing.
    pub fn get_revision(&self, path: &str, version: u32) -> Result<Box<dyn Read + Send>> {
        let path = RepoPath::parse(path)?;
        let entry = self.require_entry(&path)?;
        if version == 0 || version > entry.num_versions() {
            return Err(RepositoryError::no_entry(
                path.to_string(),
                format!(
                    "revision {version} is out of range (1, {})",
                    entry.num_versions()
                ),
            ));
        }

        let folder = self.entry_folder(&path)?;
        let (info, leaf) = self.find_revision(&folder, &path, version, None)?;
        if info.deleted {
            return Err(RepositoryError::no_entry(
                path.to_string(),
                format!("revision {version} is deleted"),
            ));
        }
        open_reader(&leaf)
    }

    /// Read a specific revision into memory.
    pub fn get_revision_bytes(&self, path: &str, version: u32) -> Result<Vec<u8>> {
        read_to_end(self.get_revision(path, version)?, path)
    }

    /// All revisions of an entry, ordered by number.
    ///
    /// Names in the revision folder that do not decode are skipped with a
    /// warning.
    pub fn versions(&self, path: &str) -> Result<Vec<VersionInfo>> {
        let path = RepoPath::parse(path)?;
        self.require_entry(&path)?;
        let folder = self.entry_folder(&path)?;

        let mut versions: Vec<VersionInfo> = self
            .scan_revisions(&folder, &path)?
            .into_iter()
            .map(|(info, _)| info)
            .collect();
        versions.sort_by_key(|v| v.number);
        Ok(versions)
    }

    /// Metadata of one revision.
    pub fn version_info(&self, path: &str, version: u32) -> Result<VersionInfo> {
        let path = RepoPath::parse(path)?;
        let entry = self.require_entry(&path)?;
        if version == 0 || version > entry.num_versions() {
            return Err(RepositoryError::no_entry(
                path.to_string(),
                format!("revision {version} does not exist"),
            ));
        }
        let folder = self.entry_folder(&path)?;
        Ok(self.find_revision(&folder, &path, version, None)?.0)
    }

    // =========================================================================
    // Creating
    // =========================================================================

    /// Store `content` as a new revision of `path`, returning its number.
    ///
    /// A missing entry is created, locked by `user` and left provisional.
    /// An existing entry must be locked by `user`: the first write of a lock
    /// session allocates the next revision, later writes overwrite it.
    pub fn create<R: Read>(&self, user: &str, path: &str, mut content: R) -> Result<u32> {
        let path = RepoPath::parse(path)?;
        let (folder, revision) = self.prepare_create(user, &path)?;

        let leaf = folder.leaf(&revision_file_name(revision, false, user));
        let context = || format!("cannot write '{}'", leaf.location());
        let mut writer = leaf.writer().io_context(context)?;
        io::copy(&mut content, &mut writer).io_context(context)?;
        writer.flush().io_context(context)?;
        drop(writer);

        self.invalidate(&path);
        Ok(revision)
    }

    /// Store an in-memory buffer as a new revision.
    pub fn create_bytes(&self, user: &str, path: &str, content: &[u8]) -> Result<u32> {
        self.create(user, path, content)
    }

    /// Store `content` as a new revision of `file_name` inside `parent`.
    pub fn create_in<R: Read>(
        &self,
        user: &str,
        parent: &str,
        file_name: &str,
        content: R,
    ) -> Result<u32> {
        let path = RepoPath::parse(parent)?.join(file_name)?;
        self.create(user, path.as_str(), content)
    }

    /// Allocate a revision and return a writer for its content.
    pub fn create_writer(&self, user: &str, path: &str) -> Result<RevisionWriter> {
        let path = RepoPath::parse(path)?;
        let (folder, revision) = self.prepare_create(user, &path)?;

        let leaf = folder.leaf(&revision_file_name(revision, false, user));
        let location = leaf.location();
        let inner = leaf
            .writer()
            .io_context(|| format!("cannot write '{location}'"))?;
        self.invalidate(&path);
        Ok(RevisionWriter {
            inner,
            revision,
            location,
        })
    }

    /// Update the record for a new or overwritten revision and return the
    /// revision folder plus the revision number to write.
    fn prepare_create(&self, user: &str, path: &RepoPath) -> Result<(C, u32)> {
        check_user(user)?;
        let (parent, name) = self.physical_parent(path)?;
        let parent_path = path.parent().unwrap_or_default();

        match self.resolve(&parent_path)? {
            None => {
                return Err(RepositoryError::no_entry(
                    parent_path.to_string(),
                    "parent container does not exist",
                ))
            }
            Some(info) if info.is_entry() => {
                return Err(RepositoryError::NotAContainer(parent_path.to_string()))
            }
            Some(info) if info.is_deleted() => {
                return Err(RepositoryError::no_entry(
                    parent_path.to_string(),
                    "parent container is deleted",
                ))
            }
            Some(_) => {}
        }

        if parent.child(&escape_name(name)).exists()
            || parent.child(&deleted_dir_name(name)).exists()
        {
            return Err(RepositoryError::NotAnEntry(path.to_string()));
        }

        let folder = self.entry_folder(path)?;
        folder
            .create()
            .io_context(|| format!("cannot create '{}'", folder.location()))?;

        let guard = self.lock_folder(&folder)?;
        let (record, revision) = match self.read_record(&folder, path)? {
            None => (Some(EntryRecord::first_revision(user)), 1),
            Some((record, _)) => match &record.lock {
                LockState::InUpdate(holder) if holder == user => (None, record.num_versions),
                LockState::Locked(holder) if holder == user => {
                    let revision = record.num_versions + 1;
                    let next = EntryRecord {
                        num_versions: revision,
                        author: user.to_string(),
                        deleted: false,
                        lock: LockState::InUpdate(user.to_string()),
                    };
                    (Some(next), revision)
                }
                LockState::Unlocked => {
                    return Err(RepositoryError::lock_conflict(
                        path.to_string(),
                        "entry is not locked",
                    ))
                }
                LockState::Locked(holder) | LockState::InUpdate(holder) => {
                    return Err(RepositoryError::lock_conflict(
                        path.to_string(),
                        format!("entry is locked by '{holder}'"),
                    ))
                }
            },
        };
        if let Some(record) = &record {
            self.write_record(&folder, path, record)?;
        }
        drop(guard);
        self.invalidate(path);

        debug!(%path, user, revision, "prepared revision");
        Ok((folder, revision))
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Lock an entry for `user`.
    ///
    /// Returns `true` if `user` now holds the lock (including when it
    /// already did) and `false` if someone else holds it.
    pub fn lock(&self, user: &str, path: &str) -> Result<bool> {
        check_user(user)?;
        let path = RepoPath::parse(path)?;
        self.require_entry(&path)?;
        let folder = self.entry_folder(&path)?;

        let guard = self.lock_folder(&folder)?;
        let mut record = self.read_existing_record(&folder, &path)?;
        if let Some(holder) = record.lock.holder() {
            return Ok(holder == user);
        }
        record.lock = LockState::Locked(user.to_string());
        self.write_record(&folder, &path, &record)?;
        drop(guard);

        self.invalidate(&path);
        debug!(%path, user, "locked");
        Ok(true)
    }

    /// Release the lock on an entry.
    ///
    /// Returns `true` if the entry is unlocked afterwards. Only the holder
    /// or a superuser may unlock; anyone else gets `false`. Releasing a
    /// provisional revision publishes it to the work area.
    pub fn unlock(&self, user: &str, path: &str) -> Result<bool> {
        let path = RepoPath::parse(path)?;
        self.require_entry(&path)?;
        let folder = self.entry_folder(&path)?;

        let guard = self.lock_folder(&folder)?;
        let mut record = self.read_existing_record(&folder, &path)?;
        let Some(holder) = record.lock.holder() else {
            return Ok(true);
        };
        if holder != user && !self.is_superuser(user) {
            return Ok(false);
        }

        let released = record.lock.is_in_update().then_some(record.num_versions);
        let previous = std::mem::take(&mut record.lock);
        self.write_record(&folder, &path, &record)?;
        drop(guard);

        self.invalidate(&path);
        debug!(%path, user, lock = ?previous, "unlocked");

        if let Some(revision) = released {
            self.mirror_revision(&path, &folder, revision, &record.author);
        }
        Ok(true)
    }

    // =========================================================================
    // Deleting
    // =========================================================================

    /// Delete an entry.
    ///
    /// Without an attic a tombstone revision is appended and its number
    /// returned. With an attic the whole revision folder moves there and
    /// `0` is returned. `force` clears any lock first; otherwise a locked
    /// entry is refused.
    pub fn delete(&self, user: &str, path: &str, force: bool) -> Result<u32> {
        check_user(user)?;
        let path = RepoPath::parse(path)?;
        self.require_entry(&path)?;
        let folder = self.entry_folder(&path)?;

        let guard = self.lock_folder(&folder)?;
        let mut record = self.read_existing_record(&folder, &path)?;
        if record.deleted {
            return Err(RepositoryError::no_entry(path.to_string(), "is already deleted"));
        }
        if record.lock.is_locked() {
            if !force {
                return Err(RepositoryError::lock_conflict(
                    path.to_string(),
                    format!(
                        "entry is locked by '{}'",
                        record.lock.holder().unwrap_or_default()
                    ),
                ));
            }
            debug!(%path, lock = ?record.lock, "force delete clears lock");
            record.lock = LockState::Unlocked;
        }

        let revision = match &self.attic {
            None => {
                let revision = record.num_versions + 1;
                let tombstone = folder.leaf(&revision_file_name(revision, true, user));
                tombstone
                    .replace(DELETED_MARKER.as_bytes())
                    .io_context(|| format!("cannot write '{}'", tombstone.location()))?;
                record = EntryRecord {
                    num_versions: revision,
                    author: user.to_string(),
                    deleted: true,
                    lock: LockState::Unlocked,
                };
                self.write_record(&folder, &path, &record)?;
                drop(guard);
                revision
            }
            Some(attic) => {
                if force {
                    self.write_record(&folder, &path, &record)?;
                }
                drop(guard);
                self.relocate_to_attic(attic, &path, &folder)?;
                0
            }
        };

        self.invalidate(&path);
        self.mirror_remove(&path);
        debug!(%path, user, revision, "deleted");
        Ok(revision)
    }

    // =========================================================================
    // Revision files
    // =========================================================================

    /// Locate revision `number`, trying `_<n>_n_<hint>` before scanning.
    pub(crate) fn find_revision(
        &self,
        folder: &C,
        path: &RepoPath,
        number: u32,
        author_hint: Option<&str>,
    ) -> Result<(VersionInfo, C::Leaf)> {
        if let Some(author) = author_hint {
            let name = revision_file_name(number, false, author);
            let leaf = folder.leaf(&name);
            if let Some(stamp) = leaf.stamp().ok().flatten() {
                if let Ok(info) = VersionInfo::from_file(&name, Some(stamp)) {
                    return Ok((info, leaf));
                }
            }
        }

        self.scan_revisions(folder, path)?
            .into_iter()
            .find(|(info, _)| info.number == number)
            .ok_or_else(|| {
                RepositoryError::corrupt(
                    path.to_string(),
                    format!("revision {number} has no content file"),
                )
            })
    }

    /// Decode every revision file in a folder.
    fn scan_revisions(&self, folder: &C, path: &RepoPath) -> Result<Vec<(VersionInfo, C::Leaf)>> {
        let names = folder
            .list()
            .io_context(|| format!("cannot list '{}'", folder.location()))?;

        let mut found = Vec::with_capacity(names.len());
        for name in names {
            let leaf = folder.leaf(&name);
            let stamp = leaf.stamp().ok().flatten();
            match VersionInfo::from_file(&name, stamp) {
                Ok(info) => found.push((info, leaf)),
                Err(RevisionNameError::Reserved) => {}
                Err(RevisionNameError::Malformed(why)) => {
                    warn!(%path, name, reason = %why, "skipping malformed revision file");
                }
            }
        }
        Ok(found)
    }
}

fn open_reader<L: Leaf>(leaf: &L) -> Result<Box<dyn Read + Send>> {
    leaf.reader()
        .io_context(|| format!("cannot read '{}'", leaf.location()))
}

fn read_to_end(mut reader: Box<dyn Read + Send>, path: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .io_context(|| format!("cannot read '{path}'"))?;
    Ok(buf)
}
