//! Property-based tests for the naming codec, the metadata record and the
//! locking protocol.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use revrepo::core::naming::{
    check_name, deleted_dir_name, entry_folder_name, escape_name, unescape_name, ChildName,
    RevisionName,
};
use revrepo::core::record::{EntryRecord, LockState};
use revrepo::core::storage::{MemoryContainer, MemoryStore};
use revrepo::engine::Repository;

/// Strategy for generating valid names, biased towards the control character.
fn valid_name() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            3 => prop::char::range('a', 'z'),
            2 => Just('_'),
            1 => Just(' '),
            1 => Just('.'),
            1 => Just('~'),
            1 => Just('ä'),
            1 => prop::char::range('0', '9'),
        ],
        1..16,
    )
    .prop_map(|chars| chars.into_iter().collect::<String>())
    .prop_filter("must pass name validation", |name| check_name(name).is_ok())
}

fn lock_state() -> impl Strategy<Value = LockState> {
    prop_oneof![
        Just(LockState::Unlocked),
        valid_name().prop_map(LockState::Locked),
        valid_name().prop_map(LockState::InUpdate),
    ]
}

proptest! {
    /// Escaping is reversible for every valid name.
    #[test]
    fn escape_unescape_inverse(name in valid_name()) {
        let escaped = escape_name(&name);
        prop_assert_eq!(unescape_name(&escaped), name.as_str());
    }

    /// The three encodings of a name classify back to their kind and name.
    #[test]
    fn child_names_classify_back(name in valid_name()) {
        prop_assert_eq!(ChildName::classify(&escape_name(&name)), ChildName::Container(name.clone()));
        prop_assert_eq!(ChildName::classify(&entry_folder_name(&name)), ChildName::Entry(name.clone()));
        prop_assert_eq!(
            ChildName::classify(&deleted_dir_name(&name)),
            ChildName::DeletedContainer(name.clone())
        );
    }

    /// Revision file names decode to what encoded them, authors with `_` included.
    #[test]
    fn revision_names_decode(number in 1u32..1_000_000, deleted in any::<bool>(), author in valid_name()) {
        let name = RevisionName { number, deleted, author };
        prop_assert_eq!(RevisionName::parse(&name.file_name()).unwrap(), name);
    }

    /// Records decode to what encoded them and reject trailing garbage.
    #[test]
    fn record_codec_inverse(
        num_versions in 0u32..100_000,
        author in valid_name(),
        deleted in any::<bool>(),
        lock in lock_state(),
        junk in 1u8..=255,
    ) {
        let record = EntryRecord { num_versions, author, deleted, lock };
        let mut bytes = record.encode().unwrap();
        prop_assert_eq!(EntryRecord::decode(&bytes).unwrap(), record);

        bytes.push(junk);
        prop_assert!(EntryRecord::decode(&bytes).is_err());
    }
}

// =============================================================================
// Protocol properties over random operation sequences
// =============================================================================

const USERS: [&str; 3] = ["alice", "bob", "carol"];
const PATH: &str = "/docs/entry.txt";

#[derive(Debug, Clone)]
enum Op {
    Lock(usize),
    Unlock(usize),
    Create(usize),
    Delete(usize, bool),
}

fn op() -> impl Strategy<Value = Op> {
    let user = 0..USERS.len();
    prop_oneof![
        user.clone().prop_map(Op::Lock),
        user.clone().prop_map(Op::Unlock),
        user.clone().prop_map(Op::Create),
        (user, any::<bool>()).prop_map(|(u, force)| Op::Delete(u, force)),
    ]
}

fn repository() -> Repository<MemoryContainer> {
    let store = MemoryStore::new();
    let repo = Repository::open(store.root()).unwrap();
    repo.mkdir("", "docs").unwrap();
    repo
}

fn record(repo: &Repository<MemoryContainer>) -> Option<EntryRecord> {
    repo.information(PATH)
        .unwrap()
        .and_then(|info| info.as_entry().map(|e| e.record.clone()))
}

fn apply(repo: &Repository<MemoryContainer>, op: &Op) {
    // Protocol refusals are expected; only the resulting state matters
    let _ = match *op {
        Op::Lock(u) => repo.lock(USERS[u], PATH).map(|_| ()),
        Op::Unlock(u) => repo.unlock(USERS[u], PATH).map(|_| ()),
        Op::Create(u) => repo.create_bytes(USERS[u], PATH, USERS[u].as_bytes()).map(|_| ()),
        Op::Delete(u, force) => repo.delete(USERS[u], PATH, force).map(|_| ()),
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Revision counts never decrease without an attic.
    #[test]
    fn revision_numbers_are_monotonic(ops in prop::collection::vec(op(), 1..40)) {
        let repo = repository();
        let mut last = 0;
        for op in &ops {
            apply(&repo, op);
            let current = record(&repo).map_or(0, |r| r.num_versions);
            prop_assert!(current >= last, "{:?} went from {} to {}", op, last, current);
            last = current;
        }
    }

    /// While one user holds the lock nobody else can take it, and a pending
    /// revision is hidden from everyone but the holder.
    #[test]
    fn lock_is_exclusive(ops in prop::collection::vec(op(), 1..40)) {
        let repo = repository();
        for op in &ops {
            apply(&repo, op);
            let Some(record) = record(&repo) else { continue };

            if let Some(holder) = record.lock.holder() {
                for other in USERS.iter().filter(|u| **u != holder) {
                    prop_assert!(!repo.lock(other, PATH).unwrap());
                }
                prop_assert!(repo.lock(holder, PATH).unwrap());
            }

            if let LockState::InUpdate(holder) = &record.lock {
                let own = repo.get_current_revision_num(holder, PATH).unwrap();
                prop_assert_eq!(own, record.num_versions);
                for other in USERS.iter().filter(|u| **u != holder.as_str()) {
                    prop_assert_eq!(repo.get_current_revision_num(other, PATH).unwrap(), own - 1);
                }
            }
        }
    }

    /// Every released revision reads back as the bytes its author wrote.
    #[test]
    fn revisions_read_back_their_author(ops in prop::collection::vec(op(), 1..30)) {
        let repo = repository();
        for op in &ops {
            apply(&repo, op);
        }
        for version in repo.versions(PATH).unwrap_or_default() {
            if version.deleted {
                continue;
            }
            let bytes = repo.get_revision_bytes(PATH, version.number).unwrap();
            prop_assert_eq!(bytes, version.author.as_bytes());
        }
    }
}
