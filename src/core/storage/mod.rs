//! core::storage
//!
//! The storage substrate the repository engine is written against.
//!
//! # Architecture
//!
//! The engine never touches `std::fs` directly. It programs to a pair of
//! capability traits:
//!
//! - [`Container`] - a directory-like node that can be listed, created,
//!   removed, renamed and locked
//! - [`Leaf`] - a file-like node with byte streams and a change [`Stamp`]
//!
//! Two substrates ship with the crate:
//!
//! - [`fs`] - the local filesystem (used by the `rr` binary)
//! - [`memory`] - a thread-safe in-memory tree for tests and embedders
//!
//! # Invariants
//!
//! - [`Container::create`] is create-if-absent and reports whether it created
//! - [`Container::rename_to`] never overwrites an existing target
//! - [`Leaf::replace`] never exposes a partially written file to readers
//! - A [`Container::lock`] guard excludes every other guard on the same
//!   container until dropped, across threads (and across processes for
//!   [`fs`] on Unix)

pub mod fs;
pub mod lock;
pub mod memory;

use std::fmt;
use std::io::{self, Read, Write};
use std::time::SystemTime;

pub use self::fs::{FsContainer, FsLeaf};
pub use self::lock::DirLock;
pub use self::memory::{MemoryContainer, MemoryLeaf, MemoryStore};

/// Change signature of a leaf.
///
/// Two stamps compare equal only if the leaf was not rewritten in between,
/// as far as the substrate can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Last modification time.
    pub modified: SystemTime,
    /// Content length in bytes.
    pub len: u64,
    /// Substrate identity of the stored object (inode, generation).
    pub id: u64,
}

/// A directory-like storage node.
pub trait Container: Clone + fmt::Debug + Send + Sync + 'static {
    /// File-like nodes inside this container.
    type Leaf: Leaf;

    /// Exclusive guard returned by [`Container::lock`].
    type Guard;

    /// Last path component.
    fn name(&self) -> String;

    /// Human-readable location for logs and errors.
    fn location(&self) -> String;

    /// Enclosing container, `None` at the substrate root.
    fn parent(&self) -> Option<Self>;

    /// Handle to a child container; it need not exist.
    fn child(&self, name: &str) -> Self;

    /// Handle to a child leaf; it need not exist.
    fn leaf(&self, name: &str) -> Self::Leaf;

    fn exists(&self) -> bool;

    fn modified(&self) -> io::Result<SystemTime>;

    /// Physical names of all children, in no particular order.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Create this container if absent. Returns `false` if it already existed.
    ///
    /// The parent must exist.
    fn create(&self) -> io::Result<bool>;

    /// Create this container and any missing ancestors.
    fn create_all(&self) -> io::Result<()>;

    /// Remove this container if it is empty. Returns `false` if it is not
    /// empty or does not exist.
    fn remove(&self) -> io::Result<bool>;

    /// Move this container to `target`. Returns `false` if `target` exists.
    ///
    /// An empty target created concurrently after the target has been
    /// claimed may still be replaced; the filesystem substrate keeps that
    /// window to the span between its claim and the rename.
    fn rename_to(&self, target: &Self) -> io::Result<bool>;

    /// Block until an exclusive guard on this container is held.
    fn lock(&self) -> io::Result<Self::Guard>;

    /// Follow a sequence of child names.
    fn descend<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .fold(self.clone(), |node, name| node.child(name))
    }
}

/// A file-like storage node.
pub trait Leaf: Clone + fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> String;

    fn location(&self) -> String;

    fn exists(&self) -> bool;

    /// Current change stamp, `None` if the leaf does not exist.
    fn stamp(&self) -> io::Result<Option<Stamp>>;

    fn reader(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Open for writing, truncating existing content. The parent must exist.
    fn writer(&self) -> io::Result<Box<dyn Write + Send>>;

    /// Replace the whole content so readers see either old or new bytes.
    fn replace(&self, bytes: &[u8]) -> io::Result<()>;

    /// Remove the leaf. Returns `false` if it did not exist.
    fn remove(&self) -> io::Result<bool>;

    /// Read the whole content.
    fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Stream this leaf's content into `target`, possibly of another substrate.
    fn copy_to<L: Leaf>(&self, target: &L) -> io::Result<u64> {
        let mut reader = self.reader()?;
        let mut writer = target.writer()?;
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        Ok(copied)
    }
}
