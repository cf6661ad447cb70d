//! core
//!
//! Domain pieces of the repository, free of orchestration.
//!
//! # Modules
//!
//! - [`error`] - Flattened error taxonomy
//! - [`naming`] - Name validation and the on-disk escaping codec
//! - [`paths`] - Normalized logical paths
//! - [`record`] - The per-entry metadata record
//! - [`info`] - Metadata snapshots handed to callers
//! - [`cache`] - Bounded metadata cache
//! - [`storage`] - Container / leaf substrate traits and implementations
//! - [`config`] - Configuration schema and loading

pub mod cache;
pub mod config;
pub mod error;
pub mod info;
pub mod naming;
pub mod paths;
pub mod record;
pub mod storage;
