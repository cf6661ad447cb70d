//! core::naming
//!
//! Mapping between user-visible names and the encoded names stored on disk.
//!
//! # Encoding
//!
//! A single control character ([`ESCAPE`], `_`) carries bookkeeping
//! information. Inside one container:
//!
//! - `name` - a live container whose name does not start with `_`
//! - `__name` - a live container named `_name` (leading escape doubled)
//! - `_f<escaped>` - the revision folder of an entry
//! - `_d<escaped>` - a tombstoned (deleted) container
//!
//! Inside a revision folder:
//!
//! - `_0_version` - the metadata record (revision 0)
//! - `_0_tmp.<unique>` - a temporary file of an atomic replace
//! - `_<n>_n_<author>` - normal revision `n`
//! - `_<n>_d_<author>` - deleted (tombstone) revision `n`
//!
//! # Example
//!
//! ```
//! use revrepo::core::naming::{entry_folder_name, revision_file_name, RevisionName};
//!
//! assert_eq!(entry_folder_name("_notes"), "_f__notes");
//! assert_eq!(revision_file_name(3, false, "alice"), "_3_n_alice");
//!
//! let parsed = RevisionName::parse("_12_d_bob_smith").unwrap();
//! assert_eq!(parsed.number, 12);
//! assert!(parsed.deleted);
//! assert_eq!(parsed.author, "bob_smith");
//! ```

use crate::core::error::{RepositoryError, Result};

/// Control character used for all encoded names.
pub const ESCAPE: char = '_';

/// Prefix of an entry's revision folder.
pub const ENTRY_PREFIX: &str = "_f";

/// Prefix of a tombstoned container.
pub const DELETED_DIR_PREFIX: &str = "_d";

/// Name of the metadata record inside a revision folder.
pub const RECORD_NAME: &str = "_0_version";

/// Prefix of temporary files written during an atomic replace.
///
/// Temporary files live next to their target. The prefix claims revision 0,
/// so a leftover temp file inside a revision folder is never read back as a
/// revision.
pub const TEMP_PREFIX: &str = "_0_tmp.";

/// Content written into tombstone revision files.
pub const DELETED_MARKER: &str = "Marker for deleted files";

/// Flag letter of a normal revision.
const NORMAL_FLAG: char = 'n';

/// Flag letter of a deleted revision.
const DELETED_FLAG: char = 'd';

/// Characters that may never appear in a name.
const INVALID_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Validate a single container or entry name.
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidName`] if the name is empty, contains
/// one of `\ / : * ? " < > |`, or is `.` / `..`.
///
/// # Example
///
/// ```
/// use revrepo::core::naming::check_name;
///
/// assert!(check_name("report 2024.txt").is_ok());
/// assert!(check_name("_underscored_").is_ok());
/// assert!(check_name("a:b").is_err());
/// assert!(check_name("..").is_err());
/// ```
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RepositoryError::InvalidName(
            "name must not be empty".into(),
        ));
    }

    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(RepositoryError::InvalidName(format!(
            "name '{name}' contains invalid character '{c}'"
        )));
    }

    if name == "." || name == ".." {
        return Err(RepositoryError::InvalidName(
            "name must not be '.' or '..'".into(),
        ));
    }

    Ok(())
}

/// Escape a user name by doubling a leading control character.
pub fn escape_name(name: &str) -> String {
    if name.starts_with(ESCAPE) {
        format!("{ESCAPE}{name}")
    } else {
        name.to_string()
    }
}

/// Reverse [`escape_name`].
///
/// Names that do not carry the doubled escape are returned unchanged.
pub fn unescape_name(encoded: &str) -> &str {
    if encoded.starts_with("__") {
        &encoded[1..]
    } else {
        encoded
    }
}

/// Encoded name of the revision folder for entry `name`.
pub fn entry_folder_name(name: &str) -> String {
    format!("{ENTRY_PREFIX}{}", escape_name(name))
}

/// Encoded name of a tombstoned container called `name`.
pub fn deleted_dir_name(name: &str) -> String {
    format!("{DELETED_DIR_PREFIX}{}", escape_name(name))
}

/// Encoded name of a revision file.
pub fn revision_file_name(number: u32, deleted: bool, author: &str) -> String {
    let flag = if deleted { DELETED_FLAG } else { NORMAL_FLAG };
    format!("{ESCAPE}{number}{ESCAPE}{flag}{ESCAPE}{author}")
}

/// Classification of one physical name found inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildName {
    /// A live container, with its decoded name.
    Container(String),
    /// A tombstoned container, with its decoded name.
    DeletedContainer(String),
    /// An entry's revision folder, with the decoded entry name.
    Entry(String),
    /// Something carrying the control character that this codec does not know.
    Unknown(String),
}

impl ChildName {
    /// Classify a physical child name.
    ///
    /// # Example
    ///
    /// ```
    /// use revrepo::core::naming::ChildName;
    ///
    /// assert_eq!(ChildName::classify("docs"), ChildName::Container("docs".into()));
    /// assert_eq!(ChildName::classify("__tmp"), ChildName::Container("_tmp".into()));
    /// assert_eq!(ChildName::classify("_fa.txt"), ChildName::Entry("a.txt".into()));
    /// assert_eq!(ChildName::classify("_dold"), ChildName::DeletedContainer("old".into()));
    /// assert_eq!(ChildName::classify("_x"), ChildName::Unknown("_x".into()));
    /// ```
    pub fn classify(physical: &str) -> Self {
        if physical.starts_with("__") {
            return ChildName::Container(unescape_name(physical).to_string());
        }

        if physical.len() > ENTRY_PREFIX.len() {
            if let Some(rest) = physical.strip_prefix(ENTRY_PREFIX) {
                return ChildName::Entry(unescape_name(rest).to_string());
            }
            if let Some(rest) = physical.strip_prefix(DELETED_DIR_PREFIX) {
                return ChildName::DeletedContainer(unescape_name(rest).to_string());
            }
        }

        if physical.starts_with(ESCAPE) {
            ChildName::Unknown(physical.to_string())
        } else {
            ChildName::Container(physical.to_string())
        }
    }

    /// The decoded user-visible name (the raw name for unknown children).
    pub fn name(&self) -> &str {
        match self {
            ChildName::Container(n)
            | ChildName::DeletedContainer(n)
            | ChildName::Entry(n)
            | ChildName::Unknown(n) => n,
        }
    }
}

/// A decoded revision file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionName {
    /// Revision number, 1-based.
    pub number: u32,
    /// Whether this revision is a tombstone.
    pub deleted: bool,
    /// Author of the revision.
    pub author: String,
}

/// Why a name inside a revision folder was not a revision file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionNameError {
    /// The metadata record or a temporary file.
    Reserved,
    /// The name does not follow `_<n>_<flag>_<author>`.
    Malformed(String),
}

impl RevisionName {
    /// Decode `_<n>_<flag>_<author>`.
    ///
    /// The author is everything after the third control character and may
    /// itself contain `_`. The number is plain decimal without sign or
    /// leading zeros, so every revision has exactly one spelling.
    pub fn parse(name: &str) -> std::result::Result<Self, RevisionNameError> {
        if name == RECORD_NAME
            || name.starts_with(TEMP_PREFIX)
            || has_legacy_temp_suffix(name)
        {
            return Err(RevisionNameError::Reserved);
        }
        let malformed = |why: &str| RevisionNameError::Malformed(format!("'{name}': {why}"));

        let rest = name
            .strip_prefix(ESCAPE)
            .ok_or_else(|| malformed("missing leading escape"))?;
        let (digits, rest) = rest
            .split_once(ESCAPE)
            .ok_or_else(|| malformed("missing separator after number"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("revision number is not numeric"));
        }
        if digits.starts_with('0') {
            return Err(malformed("revision number is zero or zero-padded"));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| malformed("revision number is out of range"))?;

        let mut chars = rest.chars();
        let deleted = match chars.next() {
            Some(NORMAL_FLAG) => false,
            Some(DELETED_FLAG) => true,
            _ => return Err(malformed("unknown revision flag")),
        };
        let author = chars
            .as_str()
            .strip_prefix(ESCAPE)
            .ok_or_else(|| malformed("missing separator before author"))?;

        Ok(RevisionName {
            number,
            deleted,
            author: author.to_string(),
        })
    }

    /// Encode back into the on-disk file name.
    pub fn file_name(&self) -> String {
        revision_file_name(self.number, self.deleted, &self.author)
    }
}

/// Older builds named temp files `<target>.<32 hex digits>`; leftovers of
/// those are stale copies, not revisions.
fn has_legacy_temp_suffix(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, suffix)) => {
            suffix.len() == 32 && suffix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}
