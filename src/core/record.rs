//! core::record
//!
//! The per-entry metadata record stored as revision 0 (`_0_version`).
//!
//! # Format
//!
//! Big-endian, fixed field order, no padding:
//!
//! | field          | encoding                                   |
//! |----------------|--------------------------------------------|
//! | `num_versions` | `i32`                                      |
//! | `author`       | `u16` byte length + modified UTF-8         |
//! | `deleted`      | `u8` (0 / 1)                               |
//! | `locked`       | `u8` (0 / 1)                               |
//! | `locker`       | string as above, only when `locked`        |
//! | `in_update`    | `u8`, only when `locked`                   |
//!
//! Strings use the modified UTF-8 of classic `DataOutput` streams: NUL is
//! written as `C0 80` and characters outside the BMP as two 3-byte
//! surrogates.
//!
//! The record is always rewritten as a whole; there are no partial updates.

use serde::Serialize;

/// Lock state of one entry.
///
/// `InUpdate` implies locked: the top revision is provisional and owned by
/// the named user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked(String),
    InUpdate(String),
}

impl LockState {
    /// The lock holder, if any.
    pub fn holder(&self) -> Option<&str> {
        match self {
            LockState::Unlocked => None,
            LockState::Locked(user) | LockState::InUpdate(user) => Some(user),
        }
    }

    pub fn is_locked(&self) -> bool {
        !matches!(self, LockState::Unlocked)
    }

    pub fn is_in_update(&self) -> bool {
        matches!(self, LockState::InUpdate(_))
    }

    /// Whether `user` currently holds the lock.
    pub fn is_held_by(&self, user: &str) -> bool {
        self.holder() == Some(user)
    }
}

/// Decoded metadata record of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    /// Number of revisions, including a provisional one.
    pub num_versions: u32,
    /// Author of the top revision.
    pub author: String,
    /// Whether the top revision is a tombstone.
    pub deleted: bool,
    pub lock: LockState,
}

/// Reasons a record could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record truncated while reading {0}")]
    Truncated(&'static str),

    #[error("invalid flag byte {value:#04x} for {field}")]
    InvalidFlag { field: &'static str, value: u8 },

    #[error("negative revision count {0}")]
    NegativeCount(i32),

    #[error("string field {0} is not valid modified UTF-8")]
    InvalidString(&'static str),

    #[error("string field is {0} bytes, longer than 65535")]
    StringTooLong(usize),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

impl EntryRecord {
    /// Record of a freshly created entry: revision 1, provisional, held by `user`.
    pub fn first_revision(user: &str) -> Self {
        Self {
            num_versions: 1,
            author: user.to_string(),
            deleted: false,
            lock: LockState::InUpdate(user.to_string()),
        }
    }

    /// Encode into the on-disk format.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(16 + self.author.len());
        out.extend_from_slice(&(self.num_versions as i32).to_be_bytes());
        write_string(&mut out, &self.author)?;
        out.push(self.deleted as u8);
        match &self.lock {
            LockState::Unlocked => out.push(0),
            LockState::Locked(user) | LockState::InUpdate(user) => {
                out.push(1);
                write_string(&mut out, user)?;
                out.push(self.lock.is_in_update() as u8);
            }
        }
        Ok(out)
    }

    /// Decode from the on-disk format.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let raw_count = i32::from_be_bytes(cursor.take_array("num_versions")?);
        let num_versions =
            u32::try_from(raw_count).map_err(|_| RecordError::NegativeCount(raw_count))?;
        let author = cursor.string("author")?;
        let deleted = cursor.flag("deleted")?;
        let lock = if cursor.flag("locked")? {
            let locker = cursor.string("locker")?;
            if cursor.flag("in_update")? {
                LockState::InUpdate(locker)
            } else {
                LockState::Locked(locker)
            }
        } else {
            LockState::Unlocked
        };

        let rest = bytes.len() - cursor.pos;
        if rest > 0 {
            return Err(RecordError::TrailingBytes(rest));
        }

        Ok(Self {
            num_versions,
            author,
            deleted,
            lock,
        })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], RecordError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(RecordError::Truncated(field))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], RecordError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, field)?);
        Ok(buf)
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, RecordError> {
        match self.take(1, field)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(RecordError::InvalidFlag { field, value }),
        }
    }

    fn string(&mut self, field: &'static str) -> Result<String, RecordError> {
        let len = u16::from_be_bytes(self.take_array(field)?) as usize;
        decode_modified_utf8(self.take(len, field)?).ok_or(RecordError::InvalidString(field))
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), RecordError> {
    let encoded = encode_modified_utf8(value);
    let len = u16::try_from(encoded.len()).map_err(|_| RecordError::StringTooLong(encoded.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let cont = |b: u8| (b & 0xC0 == 0x80).then_some((b & 0x3F) as u16);
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7F => {
                units.push(b as u16);
                i += 1;
            }
            0xC0..=0xDF => {
                let low = cont(*bytes.get(i + 1)?)?;
                units.push((((b & 0x1F) as u16) << 6) | low);
                i += 2;
            }
            0xE0..=0xEF => {
                let mid = cont(*bytes.get(i + 1)?)?;
                let low = cont(*bytes.get(i + 2)?)?;
                units.push((((b & 0x0F) as u16) << 12) | (mid << 6) | low);
                i += 3;
            }
            _ => return None,
        }
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lock: LockState) -> EntryRecord {
        EntryRecord {
            num_versions: 3,
            author: "alice".into(),
            deleted: false,
            lock,
        }
    }

    #[test]
    fn unlocked_record_layout() {
        let bytes = record(LockState::Unlocked).encode().unwrap();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 3, 0, 5, b'a', b'l', b'i', b'c', b'e', 0, 0]
        );
    }

    #[test]
    fn locked_record_layout() {
        let bytes = record(LockState::InUpdate("bo".into())).encode().unwrap();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 3, 0, 5, b'a', b'l', b'i', b'c', b'e', 0, 1, 0, 2, b'b', b'o', 1]
        );
    }

    #[test]
    fn decode_restores_each_lock_state() {
        for lock in [
            LockState::Unlocked,
            LockState::Locked("bob".into()),
            LockState::InUpdate("carol".into()),
        ] {
            let original = record(lock);
            let decoded = EntryRecord::decode(&original.encode().unwrap()).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn non_ascii_authors_use_modified_utf8() {
        let mut rec = record(LockState::Unlocked);
        rec.author = "Ö\0𝄞".into();
        let bytes = rec.encode().unwrap();
        // Ö (2) + NUL as C0 80 (2) + surrogate pair (3 + 3)
        assert_eq!(&bytes[4..6], &[0, 10]);
        assert_eq!(&bytes[8..10], &[0xC0, 0x80]);
        assert_eq!(EntryRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = record(LockState::Locked("bob".into())).encode().unwrap();
        for len in 0..bytes.len() {
            assert!(EntryRecord::decode(&bytes[..len]).is_err(), "len {len}");
        }
    }

    #[test]
    fn decode_rejects_bad_flags_and_counts() {
        let mut bytes = record(LockState::Unlocked).encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 7;
        assert!(matches!(
            EntryRecord::decode(&bytes),
            Err(RecordError::InvalidFlag { field: "locked", value: 7 })
        ));

        let mut bytes = record(LockState::Unlocked).encode().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            EntryRecord::decode(&bytes),
            Err(RecordError::NegativeCount(_))
        ));

        let mut bytes = record(LockState::Unlocked).encode().unwrap();
        bytes.push(0);
        assert_eq!(
            EntryRecord::decode(&bytes),
            Err(RecordError::TrailingBytes(1))
        );
    }

    #[test]
    fn lock_state_queries() {
        assert_eq!(LockState::Unlocked.holder(), None);
        assert!(!LockState::Unlocked.is_locked());

        let locked = LockState::Locked("bob".into());
        assert!(locked.is_locked());
        assert!(!locked.is_in_update());
        assert!(locked.is_held_by("bob"));
        assert!(!locked.is_held_by("alice"));

        let in_update = LockState::InUpdate("bob".into());
        assert!(in_update.is_locked());
        assert!(in_update.is_in_update());
    }

    #[test]
    fn first_revision_is_provisional() {
        let rec = EntryRecord::first_revision("alice");
        assert_eq!(rec.num_versions, 1);
        assert_eq!(rec.lock, LockState::InUpdate("alice".into()));
        assert!(!rec.deleted);
    }
}
