//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;

use serde::Serialize;

use crate::core::info::{RepositoryInfo, VersionInfo};
use crate::core::record::LockState;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON (always shown).
pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Describe a lock state for humans.
pub fn format_lock(lock: &LockState) -> String {
    match lock {
        LockState::Unlocked => "unlocked".to_string(),
        LockState::Locked(user) => format!("locked by {user}"),
        LockState::InUpdate(user) => format!("locked by {user} (pending revision)"),
    }
}

/// One listing line for a container child.
pub fn format_info_line(info: &RepositoryInfo) -> String {
    match info {
        RepositoryInfo::Container(c) => {
            let mut line = format!("{}/", info.name());
            if c.deleted {
                line.push_str("  (deleted)");
            }
            line
        }
        RepositoryInfo::Entry(e) => {
            let mut line = format!("{}  r{}  {}", info.name(), e.num_versions(), e.author());
            if e.is_deleted() {
                line.push_str("  (deleted)");
            }
            if e.is_locked() {
                line.push_str(&format!("  [{}]", format_lock(e.lock())));
            }
            line
        }
    }
}

/// One history line for a revision.
pub fn format_version_line(version: &VersionInfo) -> String {
    let mut line = format!("r{}  {}", version.number, version.author);
    if let Some(size) = version.size {
        line.push_str(&format!("  {size} bytes"));
    }
    if let Some(when) = version.last_modified {
        line.push_str(&format!("  {}", when.format("%Y-%m-%d %H:%M:%S")));
    }
    if version.deleted {
        line.push_str("  (deleted)");
    }
    line
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::info::ContainerInfo;
    use crate::core::paths::RepoPath;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn lock_descriptions() {
        assert_eq!(format_lock(&LockState::Unlocked), "unlocked");
        assert_eq!(format_lock(&LockState::Locked("bob".into())), "locked by bob");
        assert!(format_lock(&LockState::InUpdate("bob".into())).contains("pending"));
    }

    #[test]
    fn container_line_marks_deleted() {
        let info = RepositoryInfo::Container(ContainerInfo {
            path: RepoPath::parse("docs").unwrap(),
            deleted: true,
            last_modified: None,
        });
        assert_eq!(format_info_line(&info), "docs/  (deleted)");
    }

    #[test]
    fn version_line() {
        let version = VersionInfo {
            number: 3,
            author: "carol".into(),
            deleted: true,
            size: Some(24),
            last_modified: None,
        };
        assert_eq!(format_version_line(&version), "r3  carol  24 bytes  (deleted)");
    }

    #[test]
    fn list_prefix() {
        assert_eq!(format_list(&["a", "b"], "- "), "- a\n- b");
    }
}
