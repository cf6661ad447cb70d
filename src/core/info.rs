//! core::info
//!
//! Metadata snapshots handed out by the repository.
//!
//! # Types
//!
//! - [`RepositoryInfo`] - one resolved path, either a container or an entry
//! - [`ContainerInfo`] - a live or tombstoned container
//! - [`EntryInfo`] - an entry with its decoded metadata record
//! - [`VersionInfo`] - one physical revision file
//!
//! Snapshots are immutable values. The cache may drop and recompute them at
//! any time; holding one never pins repository state.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::naming::{RevisionName, RevisionNameError};
use crate::core::paths::RepoPath;
use crate::core::record::{EntryRecord, LockState};
use crate::core::storage::Stamp;

/// Metadata for one resolved path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryInfo {
    Container(ContainerInfo),
    Entry(EntryInfo),
}

impl RepositoryInfo {
    pub fn path(&self) -> &RepoPath {
        match self {
            RepositoryInfo::Container(c) => &c.path,
            RepositoryInfo::Entry(e) => &e.path,
        }
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.path().name().unwrap_or("")
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, RepositoryInfo::Entry(_))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, RepositoryInfo::Container(_))
    }

    /// Whether the node is a tombstoned container or a deleted entry.
    pub fn is_deleted(&self) -> bool {
        match self {
            RepositoryInfo::Container(c) => c.deleted,
            RepositoryInfo::Entry(e) => e.record.deleted,
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            RepositoryInfo::Container(c) => c.last_modified,
            RepositoryInfo::Entry(e) => e.last_modified,
        }
    }

    pub fn as_entry(&self) -> Option<&EntryInfo> {
        match self {
            RepositoryInfo::Entry(e) => Some(e),
            RepositoryInfo::Container(_) => None,
        }
    }
}

/// A container node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub path: RepoPath,
    /// Stored under the tombstone prefix.
    pub deleted: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

/// An entry node together with its metadata record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub path: RepoPath,
    #[serde(flatten)]
    pub record: EntryRecord,
    /// Change stamp of the record this snapshot was decoded from.
    #[serde(skip)]
    pub(crate) stamp: Stamp,
    pub last_modified: Option<DateTime<Utc>>,
}

impl EntryInfo {
    pub(crate) fn new(path: RepoPath, record: EntryRecord, stamp: Stamp) -> Self {
        Self {
            path,
            record,
            stamp,
            last_modified: Some(DateTime::<Utc>::from(stamp.modified)),
        }
    }

    /// Total revision count, including a provisional top revision.
    pub fn num_versions(&self) -> u32 {
        self.record.num_versions
    }

    /// Revision count visible to `user`.
    ///
    /// While the top revision is provisional, everyone except the lock
    /// holder sees one revision less. `None` stands for an anonymous reader.
    pub fn num_versions_for(&self, user: Option<&str>) -> u32 {
        match &self.record.lock {
            LockState::InUpdate(holder) if user != Some(holder.as_str()) => {
                self.record.num_versions.saturating_sub(1)
            }
            _ => self.record.num_versions,
        }
    }

    pub fn author(&self) -> &str {
        &self.record.author
    }

    pub fn is_deleted(&self) -> bool {
        self.record.deleted
    }

    pub fn lock(&self) -> &LockState {
        &self.record.lock
    }

    pub fn is_locked(&self) -> bool {
        self.record.lock.is_locked()
    }

    pub fn locker(&self) -> Option<&str> {
        self.record.lock.holder()
    }

    pub fn is_in_update(&self) -> bool {
        self.record.lock.is_in_update()
    }
}

/// One physical revision of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub number: u32,
    pub author: String,
    pub deleted: bool,
    /// Stored size in bytes, if the substrate reported it.
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl VersionInfo {
    /// Derive from a revision file name and the file's stamp.
    pub fn from_file(name: &str, stamp: Option<Stamp>) -> Result<Self, RevisionNameError> {
        let RevisionName {
            number,
            deleted,
            author,
        } = RevisionName::parse(name)?;
        Ok(Self {
            number,
            author,
            deleted,
            size: stamp.map(|s| s.len),
            last_modified: stamp.map(|s| DateTime::<Utc>::from(s.modified)),
        })
    }
}

pub(crate) fn timestamp(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> Stamp {
        Stamp {
            modified: SystemTime::UNIX_EPOCH,
            len: 12,
            id: 1,
        }
    }

    fn entry(lock: LockState, num_versions: u32) -> EntryInfo {
        EntryInfo::new(
            RepoPath::parse("docs/a.txt").unwrap(),
            EntryRecord {
                num_versions,
                author: "alice".into(),
                deleted: false,
                lock,
            },
            stamp(),
        )
    }

    #[test]
    fn visibility_hides_provisional_revision_from_others() {
        let info = entry(LockState::InUpdate("alice".into()), 2);
        assert_eq!(info.num_versions_for(Some("alice")), 2);
        assert_eq!(info.num_versions_for(Some("bob")), 1);
        assert_eq!(info.num_versions_for(None), 1);
    }

    #[test]
    fn visibility_ignores_plain_locks() {
        let info = entry(LockState::Locked("alice".into()), 2);
        assert_eq!(info.num_versions_for(Some("bob")), 2);
        let info = entry(LockState::Unlocked, 3);
        assert_eq!(info.num_versions_for(None), 3);
    }

    #[test]
    fn repository_info_accessors() {
        let info = RepositoryInfo::Entry(entry(LockState::Unlocked, 1));
        assert!(info.is_entry());
        assert!(!info.is_deleted());
        assert_eq!(info.name(), "a.txt");
        assert_eq!(
            info.last_modified(),
            Some(DateTime::<Utc>::from(SystemTime::UNIX_EPOCH))
        );

        let dir = RepositoryInfo::Container(ContainerInfo {
            path: RepoPath::root(),
            deleted: false,
            last_modified: None,
        });
        assert!(dir.is_container());
        assert_eq!(dir.name(), "");
        assert!(dir.as_entry().is_none());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let info = RepositoryInfo::Entry(entry(LockState::InUpdate("bob".into()), 4));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "entry");
        assert_eq!(json["path"], "/docs/a.txt");
        assert_eq!(json["num_versions"], 4);
        assert_eq!(json["lock"]["state"], "in_update");
        assert_eq!(json["lock"]["user"], "bob");
    }

    #[test]
    fn version_info_from_file_name() {
        let v = VersionInfo::from_file("_3_d_carol", Some(stamp())).unwrap();
        assert_eq!(v.number, 3);
        assert!(v.deleted);
        assert_eq!(v.author, "carol");
        assert_eq!(v.size, Some(12));

        assert!(VersionInfo::from_file("_0_version", None).is_err());
    }
}
