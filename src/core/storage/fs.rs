//! core::storage::fs
//!
//! Local filesystem substrate.
//!
//! Containers are directories and leaves are regular files. Atomic
//! [`Leaf::replace`] writes a sibling temp file named
//! [`TEMP_PREFIX`]`<uuid>` and renames it over the target. The prefix
//! decodes as reserved, so a temp file left behind by a crash is never
//! mistaken for a revision.
//!
//! [`Container::rename_to`] claims the target with `create_dir` before
//! renaming, because `rename(2)` silently replaces an empty directory.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::lock::DirLock;
use crate::core::naming::TEMP_PREFIX;
use super::{Container, Leaf, Stamp};

/// A directory on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsContainer {
    path: PathBuf,
}

impl FsContainer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Container for FsContainer {
    type Leaf = FsLeaf;
    type Guard = DirLock;

    fn name(&self) -> String {
        file_name(&self.path)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn parent(&self) -> Option<Self> {
        self.path.parent().map(FsContainer::new)
    }

    fn child(&self, name: &str) -> Self {
        FsContainer::new(self.path.join(name))
    }

    fn leaf(&self, name: &str) -> FsLeaf {
        FsLeaf::new(self.path.join(name))
    }

    fn exists(&self) -> bool {
        self.path.is_dir()
    }

    fn modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.path)?.modified()
    }

    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for dirent in fs::read_dir(&self.path)? {
            let dirent = dirent?;
            match dirent.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(
                    dir = %self.path.display(),
                    name = ?raw,
                    "skipping non-UTF-8 file name"
                ),
            }
        }
        Ok(names)
    }

    fn create(&self) -> io::Result<bool> {
        match fs::create_dir(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && self.path.is_dir() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_all(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path)
    }

    fn remove(&self) -> io::Result<bool> {
        if !self.path.is_dir() {
            return Ok(false);
        }
        if fs::read_dir(&self.path)?.next().is_some() {
            return Ok(false);
        }
        match fs::remove_dir(&self.path) {
            Ok(()) => Ok(true),
            // Raced with a concurrent writer
            Err(_) if self.path.is_dir() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn rename_to(&self, target: &Self) -> io::Result<bool> {
        if !self.path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", self.path.display()),
            ));
        }
        // The claim fails if anyone else owns the target
        match fs::create_dir(&target.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e),
        }
        if let Err(e) = fs::rename(&self.path, &target.path) {
            let _ = fs::remove_dir(&target.path);
            return Err(e);
        }
        Ok(true)
    }

    fn lock(&self) -> io::Result<DirLock> {
        DirLock::acquire(&self.path)
    }
}

/// A regular file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsLeaf {
    path: PathBuf,
}

impl FsLeaf {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Leaf for FsLeaf {
    fn name(&self) -> String {
        file_name(&self.path)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn stamp(&self) -> io::Result<Option<Stamp>> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(Stamp {
            modified: meta.modified()?,
            len: meta.len(),
            id: file_id(&meta),
        }))
    }

    fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(File::create(&self.path)?))
    }

    fn replace(&self, bytes: &[u8]) -> io::Result<()> {
        let temp_path = self
            .path
            .with_file_name(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4().simple()));

        let written = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if written.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        written
    }

    fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn file_id(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_id(_meta: &fs::Metadata) -> u64 {
    0
}
