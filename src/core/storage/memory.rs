//! core::storage::memory
//!
//! Thread-safe in-memory substrate.
//!
//! # Architecture
//!
//! A [`MemoryStore`] owns one tree, kept as a sorted map from slash-joined
//! node paths to nodes. Container and leaf handles are cheap clones that
//! share the store. Every file commit bumps a global generation counter
//! that serves as the leaf's identity in its [`Stamp`], so two commits
//! within the same clock tick still produce different stamps.
//!
//! Writers buffer their bytes and commit on `flush` and on drop. Opening a
//! writer commits an empty file immediately, matching a truncating open on
//! a real filesystem.
//!
//! # Example
//!
//! ```
//! use revrepo::core::storage::{Container, Leaf, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let docs = store.root().child("docs");
//! assert!(docs.create().unwrap());
//! docs.leaf("a.txt").replace(b"hello").unwrap();
//! assert_eq!(docs.list().unwrap(), vec!["a.txt"]);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::SystemTime;

use super::{Container, Leaf, Stamp};

#[derive(Debug, Clone)]
enum Node {
    Dir {
        modified: SystemTime,
    },
    File {
        data: Arc<Vec<u8>>,
        modified: SystemTime,
        generation: u64,
    },
}

#[derive(Debug, Default)]
struct Shared {
    tree: Mutex<BTreeMap<String, Node>>,
    generation: AtomicU64,
    locked: Mutex<HashSet<String>>,
    released: Condvar,
}

impl Shared {
    fn tree(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn commit(&self, path: &str, data: Vec<u8>) -> io::Result<()> {
        let generation = self.next_generation();
        let mut tree = self.tree();
        require_dir(&tree, parent_key(path))?;
        if let Some(Node::Dir { .. }) = tree.get(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("'{path}' is a directory"),
            ));
        }
        tree.insert(
            path.to_string(),
            Node::File {
                data: Arc::new(data),
                modified: SystemTime::now(),
                generation,
            },
        );
        Ok(())
    }
}

/// An in-memory tree with a root container.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("nodes", &self.shared.tree().len())
            .finish()
    }
}

impl MemoryStore {
    /// A store holding only an empty root container.
    pub fn new() -> Self {
        let store = Self::default();
        store.shared.tree().insert(
            String::new(),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        store
    }

    /// The root container.
    pub fn root(&self) -> MemoryContainer {
        MemoryContainer {
            shared: Arc::clone(&self.shared),
            path: String::new(),
        }
    }

    /// Handle to a container by slash-separated path from the root.
    pub fn container(&self, path: &str) -> MemoryContainer {
        self.root().descend(path.split('/').filter(|s| !s.is_empty()))
    }
}

/// A directory-like node of a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryContainer {
    shared: Arc<Shared>,
    path: String,
}

impl fmt::Debug for MemoryContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryContainer").field(&self.path).finish()
    }
}

/// A file-like node of a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryLeaf {
    shared: Arc<Shared>,
    path: String,
}

impl fmt::Debug for MemoryLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryLeaf").field(&self.path).finish()
    }
}

/// Exclusive guard on a [`MemoryContainer`].
pub struct MemoryGuard {
    shared: Arc<Shared>,
    path: String,
}

impl fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryGuard").field(&self.path).finish()
    }
}

impl Drop for MemoryGuard {
    fn drop(&mut self) {
        let mut locked = self
            .shared
            .locked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locked.remove(&self.path);
        self.shared.released.notify_all();
    }
}

fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_key(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn last_segment(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(_, name)| name)
        .unwrap_or(path)
        .to_string()
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("'{path}' not found"))
}

fn require_dir(tree: &BTreeMap<String, Node>, path: &str) -> io::Result<()> {
    match tree.get(path) {
        Some(Node::Dir { .. }) => Ok(()),
        _ => Err(not_found(path)),
    }
}

/// Keys strictly beneath `path`.
fn descendants<'a>(
    tree: &'a BTreeMap<String, Node>,
    path: &'a str,
) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    tree.range(prefix.clone()..)
        .take_while(move |(key, _)| key.starts_with(&prefix))
        .filter(|(key, _)| !key.is_empty())
}

impl Container for MemoryContainer {
    type Leaf = MemoryLeaf;
    type Guard = MemoryGuard;

    fn name(&self) -> String {
        last_segment(&self.path)
    }

    fn location(&self) -> String {
        format!("memory:/{}", self.path)
    }

    fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        Some(Self {
            shared: Arc::clone(&self.shared),
            path: parent_key(&self.path).to_string(),
        })
    }

    fn child(&self, name: &str) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            path: join_key(&self.path, name),
        }
    }

    fn leaf(&self, name: &str) -> MemoryLeaf {
        MemoryLeaf {
            shared: Arc::clone(&self.shared),
            path: join_key(&self.path, name),
        }
    }

    fn exists(&self) -> bool {
        matches!(self.shared.tree().get(&self.path), Some(Node::Dir { .. }))
    }

    fn modified(&self) -> io::Result<SystemTime> {
        match self.shared.tree().get(&self.path) {
            Some(Node::Dir { modified }) => Ok(*modified),
            _ => Err(not_found(&self.path)),
        }
    }

    fn list(&self) -> io::Result<Vec<String>> {
        let tree = self.shared.tree();
        require_dir(&tree, &self.path)?;
        let depth = if self.path.is_empty() { 0 } else { 1 };
        Ok(descendants(&tree, &self.path)
            .filter(|(key, _)| {
                key[self.path.len() + depth..].find('/').is_none()
            })
            .map(|(key, _)| last_segment(key))
            .collect())
    }

    fn create(&self) -> io::Result<bool> {
        let mut tree = self.shared.tree();
        match tree.get(&self.path) {
            Some(Node::Dir { .. }) => return Ok(false),
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' is a file", self.path),
                ))
            }
            None => {}
        }
        require_dir(&tree, parent_key(&self.path))?;
        tree.insert(
            self.path.clone(),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Ok(true)
    }

    fn create_all(&self) -> io::Result<()> {
        if let Some(parent) = self.parent() {
            parent.create_all()?;
        }
        self.create().map(|_| ())
    }

    fn remove(&self) -> io::Result<bool> {
        let mut tree = self.shared.tree();
        if self.path.is_empty() || !matches!(tree.get(&self.path), Some(Node::Dir { .. })) {
            return Ok(false);
        }
        if descendants(&tree, &self.path).next().is_some() {
            return Ok(false);
        }
        tree.remove(&self.path);
        Ok(true)
    }

    fn rename_to(&self, target: &Self) -> io::Result<bool> {
        let mut tree = self.shared.tree();
        if tree.contains_key(&target.path) {
            return Ok(false);
        }
        require_dir(&tree, &self.path)?;
        require_dir(&tree, parent_key(&target.path))?;
        if target.path.starts_with(&format!("{}/", self.path)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot move '{}' into itself", self.path),
            ));
        }

        let moved: Vec<String> = descendants(&tree, &self.path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in moved {
            if let Some(node) = tree.remove(&key) {
                let suffix = &key[self.path.len()..];
                tree.insert(format!("{}{}", target.path, suffix), node);
            }
        }
        if let Some(node) = tree.remove(&self.path) {
            tree.insert(target.path.clone(), node);
        }
        Ok(true)
    }

    fn lock(&self) -> io::Result<MemoryGuard> {
        if !self.exists() {
            return Err(not_found(&self.path));
        }
        let mut locked = self
            .shared
            .locked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while locked.contains(&self.path) {
            locked = self
                .shared
                .released
                .wait(locked)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        locked.insert(self.path.clone());
        Ok(MemoryGuard {
            shared: Arc::clone(&self.shared),
            path: self.path.clone(),
        })
    }
}

impl Leaf for MemoryLeaf {
    fn name(&self) -> String {
        last_segment(&self.path)
    }

    fn location(&self) -> String {
        format!("memory:/{}", self.path)
    }

    fn exists(&self) -> bool {
        matches!(self.shared.tree().get(&self.path), Some(Node::File { .. }))
    }

    fn stamp(&self) -> io::Result<Option<Stamp>> {
        Ok(match self.shared.tree().get(&self.path) {
            Some(Node::File {
                data,
                modified,
                generation,
            }) => Some(Stamp {
                modified: *modified,
                len: data.len() as u64,
                id: *generation,
            }),
            _ => None,
        })
    }

    fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        match self.shared.tree().get(&self.path) {
            Some(Node::File { data, .. }) => Ok(Box::new(SharedReader {
                data: Arc::clone(data),
                pos: 0,
            })),
            _ => Err(not_found(&self.path)),
        }
    }

    fn writer(&self) -> io::Result<Box<dyn Write + Send>> {
        self.shared.commit(&self.path, Vec::new())?;
        Ok(Box::new(MemoryWriter {
            shared: Arc::clone(&self.shared),
            path: self.path.clone(),
            buf: Vec::new(),
            dirty: false,
        }))
    }

    fn replace(&self, bytes: &[u8]) -> io::Result<()> {
        self.shared.commit(&self.path, bytes.to_vec())
    }

    fn remove(&self) -> io::Result<bool> {
        let mut tree = self.shared.tree();
        if let Some(Node::File { .. }) = tree.get(&self.path) {
            tree.remove(&self.path);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

struct SharedReader {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

struct MemoryWriter {
    shared: Arc<Shared>,
    path: String,
    buf: Vec<u8>,
    dirty: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.dirty {
            self.shared.commit(&self.path, self.buf.clone())?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path, error = %e, "in-memory write lost on drop");
        }
    }
}
