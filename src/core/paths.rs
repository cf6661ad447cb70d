//! core::paths
//!
//! Normalized logical paths inside a repository.
//!
//! # Normalization
//!
//! A logical path is a `/`-delimited sequence of names. Parsing accepts
//! leading, trailing and repeated separators as well as `\` separators, and
//! every remaining segment must pass [`check_name`]. The empty sequence is
//! the repository root.
//!
//! Physical encoding (escaping, `_f` / `_d` prefixes) never happens here;
//! see [`crate::core::naming`].
//!
//! # Example
//!
//! ```
//! use revrepo::core::paths::RepoPath;
//!
//! let path = RepoPath::parse("/docs//a.txt").unwrap();
//! assert_eq!(path.as_str(), "docs/a.txt");
//! assert_eq!(path.name(), Some("a.txt"));
//! assert_eq!(path.parent().unwrap().as_str(), "docs");
//! assert_eq!(path.to_string(), "/docs/a.txt");
//!
//! assert!(RepoPath::parse("/").unwrap().is_root());
//! assert!(RepoPath::parse("docs/../etc").is_err());
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use crate::core::error::Result;
use crate::core::naming::check_name;

/// A validated, normalized logical path.
///
/// The string form has no leading or trailing separator; the root is the
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoPath {
    normalized: String,
}

impl RepoPath {
    /// The repository root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse and normalize a logical path.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidName`](crate::core::error::RepositoryError::InvalidName)
    /// if any segment is `.`, `..` or contains a reserved character.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut normalized = String::with_capacity(raw.len());
        for segment in raw.split(['/', '\\']).filter(|s| !s.is_empty()) {
            check_name(segment)?;
            if !normalized.is_empty() {
                normalized.push('/');
            }
            normalized.push_str(segment);
        }
        Ok(Self { normalized })
    }

    /// Whether this is the repository root.
    pub fn is_root(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Normalized form without leading separator.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.normalized.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.normalized.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.normalized,
        })
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.normalized.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };
        Some(Self { normalized: parent })
    }

    /// Append one validated name.
    pub fn join(&self, name: &str) -> Result<RepoPath> {
        check_name(name)?;
        Ok(self.join_unchecked(name))
    }

    /// Append a name already known to be valid (decoded from storage).
    pub(crate) fn join_unchecked(&self, name: &str) -> RepoPath {
        let normalized = if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self.normalized, name)
        };
        Self { normalized }
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &RepoPath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.normalized
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.normalized)
    }
}

impl Serialize for RepoPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_separators() {
        for raw in ["docs/a", "/docs/a", "docs/a/", "//docs///a", "\\docs\\a"] {
            assert_eq!(RepoPath::parse(raw).unwrap().as_str(), "docs/a", "{raw}");
        }
    }

    #[test]
    fn parse_root_forms() {
        for raw in ["", "/", "//", "\\"] {
            assert!(RepoPath::parse(raw).unwrap().is_root(), "{raw}");
        }
        assert_eq!(RepoPath::root().to_string(), "/");
    }

    #[test]
    fn parse_rejects_invalid_segments() {
        assert!(RepoPath::parse("a/./b").is_err());
        assert!(RepoPath::parse("a/../b").is_err());
        assert!(RepoPath::parse("a/b:c").is_err());
        assert!(RepoPath::parse("a/b*").is_err());
    }

    #[test]
    fn name_and_parent() {
        let p = RepoPath::parse("a/b/c").unwrap();
        assert_eq!(p.name(), Some("c"));
        assert_eq!(p.segments().count(), 3);

        let parent = p.parent().unwrap();
        assert_eq!(parent.as_str(), "a/b");

        let top = RepoPath::parse("a").unwrap();
        assert_eq!(top.name(), Some("a"));
        assert!(top.parent().unwrap().is_root());

        assert_eq!(RepoPath::root().name(), None);
        assert_eq!(RepoPath::root().parent(), None);
    }

    #[test]
    fn join_validates_name() {
        let base = RepoPath::parse("docs").unwrap();
        assert_eq!(base.join("a.txt").unwrap().as_str(), "docs/a.txt");
        assert_eq!(RepoPath::root().join("x").unwrap().as_str(), "x");
        assert!(base.join("a/b").is_err());
        assert!(base.join("..").is_err());
    }

    #[test]
    fn starts_with_respects_segment_boundaries() {
        let docs = RepoPath::parse("docs").unwrap();
        assert!(RepoPath::parse("docs").unwrap().starts_with(&docs));
        assert!(RepoPath::parse("docs/a").unwrap().starts_with(&docs));
        assert!(!RepoPath::parse("docs2/a").unwrap().starts_with(&docs));
        assert!(docs.starts_with(&RepoPath::root()));
    }

    #[test]
    fn serializes_with_leading_separator() {
        let p = RepoPath::parse("a/b").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"/a/b\"");
    }
}
