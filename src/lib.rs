//! revrepo - A versioned, lockable, file-backed object repository
//!
//! Entries (files) live in a tree of containers (directories). Every write
//! produces a numbered revision, writes require a per-entry lock, and a new
//! revision stays private to its author until the lock is released.
//! Deleted entries keep their history as tombstones, or move to an attic.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The [`engine::Repository`] and its protocols
//! - [`core`] - Names, paths, the metadata record, cache, storage, config
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. A record is only rewritten under its entry folder's exclusive lock
//! 2. Revision numbers of an entry are dense and never reused
//! 3. Readers other than the lock holder never observe a provisional revision
//! 4. The record file is replaced atomically, never edited in place

pub mod cli;
pub mod core;
pub mod engine;
pub mod ui;
