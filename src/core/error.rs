//! core::error
//!
//! Error taxonomy for repository operations.
//!
//! # Kinds
//!
//! - [`RepositoryError::NoEntry`] - the path does not lead to an existing,
//!   non-deleted entry or revision (includes revisions not yet released)
//! - [`RepositoryError::InvalidName`] - caller supplied a name or path that
//!   cannot be stored
//! - [`RepositoryError::NotAnEntry`] / [`RepositoryError::NotAContainer`] -
//!   the operation was applied to the wrong kind of node
//! - [`RepositoryError::LockConflict`] - the locking protocol refused the call
//! - [`RepositoryError::Rejected`] - any other refused operation
//! - [`RepositoryError::Corrupt`] - on-disk state cannot be decoded
//! - [`RepositoryError::Io`] - the storage substrate failed

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The path does not resolve to a live entry, container or revision.
    #[error("no entry '{path}': {reason}")]
    NoEntry { path: String, reason: String },

    /// A name or path failed validation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// An entry was expected but the path is something else.
    #[error("'{0}' is not an entry")]
    NotAnEntry(String),

    /// A container was expected but the path is something else.
    #[error("'{0}' is not a container")]
    NotAContainer(String),

    /// The locking protocol refused the operation.
    #[error("lock conflict on '{path}': {reason}")]
    LockConflict { path: String, reason: String },

    /// The operation was refused for a reason other than locking.
    #[error("cannot modify '{path}': {reason}")]
    Rejected { path: String, reason: String },

    /// Stored state could not be decoded.
    #[error("corrupt repository state at '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    /// I/O failure in the storage substrate.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RepositoryError {
    pub(crate) fn no_entry(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn lock_conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LockConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with a description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error only reports absence (`NoEntry`).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoEntry { .. })
    }
}

/// Attach context to a raw I/O result.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| RepositoryError::io(context(), e))
    }
}
