//! core::storage::lock
//!
//! Exclusive advisory lock on a directory of the local filesystem.
//!
//! # Architecture
//!
//! An entry's metadata record is updated by read-modify-write. Holding a
//! [`DirLock`] on the entry's revision folder serializes those updates
//! between threads and between processes sharing the filesystem.
//!
//! On Unix the lock is an `fs2` exclusive lock (`flock`) taken on a handle
//! to the directory itself, so no extra file appears in the revision
//! folder. Each acquisition opens its own handle, which makes the lock
//! exclusive between threads of one process as well. On other platforms
//! directories cannot be opened as files; the guard is then a no-op and
//! only the substrate's atomic rename protects the record.
//!
//! # Invariants
//!
//! - The lock is released on drop (RAII pattern)
//! - [`DirLock::acquire`] blocks; [`DirLock::try_acquire`] fails fast
//!
//! # Example
//!
//! ```
//! use revrepo::core::storage::DirLock;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let lock = DirLock::acquire(dir.path()).unwrap();
//! assert!(lock.is_held());
//! assert!(DirLock::try_acquire(dir.path()).unwrap().is_none());
//! drop(lock);
//! assert!(DirLock::try_acquire(dir.path()).unwrap().is_some());
//! ```

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use fs2::FileExt;

#[cfg(unix)]
type Handle = std::fs::File;

#[cfg(not(unix))]
type Handle = ();

/// An exclusive lock on one directory.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    /// Present while the lock is held.
    handle: Option<Handle>,
}

impl DirLock {
    /// Block until the lock on `dir` is held.
    pub fn acquire(dir: &Path) -> io::Result<Self> {
        let handle = open_handle(dir)?;
        #[cfg(unix)]
        handle.lock_exclusive()?;
        Ok(Self {
            path: dir.to_path_buf(),
            handle: Some(handle),
        })
    }

    /// Take the lock if it is free, `None` if another holder has it.
    pub fn try_acquire(dir: &Path) -> io::Result<Option<Self>> {
        let handle = open_handle(dir)?;
        #[cfg(unix)]
        match handle.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        }
        Ok(Some(Self {
            path: dir.to_path_buf(),
            handle: Some(handle),
        }))
    }

    pub fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    /// The locked directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release before the guard goes out of scope.
    pub fn release(&mut self) -> io::Result<()> {
        if let Some(handle) = self.handle.take() {
            unlock(handle)?;
        }
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        // Best-effort release on drop
        if let Some(handle) = self.handle.take() {
            let _ = unlock(handle);
        }
    }
}

#[cfg(unix)]
fn open_handle(dir: &Path) -> io::Result<Handle> {
    std::fs::File::open(dir)
}

#[cfg(unix)]
fn unlock(handle: Handle) -> io::Result<()> {
    FileExt::unlock(&handle)
}

#[cfg(not(unix))]
fn open_handle(dir: &Path) -> io::Result<Handle> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        ))
    }
}

#[cfg(not(unix))]
fn unlock(_handle: Handle) -> io::Result<()> {
    Ok(())
}
