//! Contract tests across node variants.

use rand::Rng;

use crate::log::codec::{self, LogReader};
use crate::log::entry::write_node_id;
use crate::log::{LOG_VERSION, LogEntryType, LogError, LogReadable, Loggable};
use crate::tree::{
    BIN_LEVEL, Bin, DBIN_LEVEL, DUPTREE_LEVEL, Dbin, Din, DupCountLn, GenerationClock, In, InList,
    Ln, MAIN_LEVEL, Node, NodeArena, NodeError, NodeHandle, NodeIdAllocator, ObsoleteTracker,
    ResidentNodeRegistry, TreeLocation, TreeNode,
};

/// A small tree:
///
/// ```text
/// IN
/// └── BIN
///     ├── [a] DIN
///     │       ├── [1] DBIN ── LN, LN
///     │       └── [2] DBIN ── LN
///     └── [b] LN
/// ```
struct Fixture {
    arena: NodeArena,
    root: NodeHandle,
    bin: NodeHandle,
    din: NodeHandle,
    dbins: [NodeHandle; 2],
    leaves: Vec<NodeHandle>,
}

fn internal_with_entries(mut node: Node, keys: &[&[u8]]) -> Node {
    let body = node.as_internal_mut().expect("internal");
    for (i, key) in keys.iter().enumerate() {
        body.add_entry(key.to_vec(), 100 + i as u64).expect("entry");
    }
    node
}

fn fixture(ids: &NodeIdAllocator) -> Fixture {
    let mut arena = NodeArena::new();
    let root = arena.insert(internal_with_entries(
        Node::In(In::new(ids, 2, Vec::new(), 8).expect("in")),
        &[b""],
    ));
    let bin = arena.insert(internal_with_entries(
        Node::Bin(Bin::new(ids, Vec::new(), 8).expect("bin")),
        &[b"a", b"b"],
    ));
    let din = arena.insert(internal_with_entries(
        Node::Din(Din::new(ids, 2, b"a".to_vec(), 8, None).expect("din")),
        &[b"1", b"2"],
    ));
    let dbin_a = arena.insert(internal_with_entries(
        Node::Dbin(Dbin::new(ids, b"1".to_vec(), 8).expect("dbin")),
        &[b"1a", b"1b"],
    ));
    let dbin_b = arena.insert(internal_with_entries(
        Node::Dbin(Dbin::new(ids, b"2".to_vec(), 8).expect("dbin")),
        &[b"2a"],
    ));
    let leaves: Vec<NodeHandle> = (0..4)
        .map(|i| arena.insert(Node::Ln(Ln::new(ids, vec![i]).expect("ln"))))
        .collect();

    arena.attach_child(root, 0, bin).expect("attach");
    arena.attach_child(bin, 0, din).expect("attach");
    arena.attach_child(bin, 1, leaves[3]).expect("attach");
    arena.attach_child(din, 0, dbin_a).expect("attach");
    arena.attach_child(din, 1, dbin_b).expect("attach");
    arena.attach_child(dbin_a, 0, leaves[0]).expect("attach");
    arena.attach_child(dbin_a, 1, leaves[1]).expect("attach");
    arena.attach_child(dbin_b, 0, leaves[2]).expect("attach");

    Fixture {
        arena,
        root,
        bin,
        din,
        dbins: [dbin_a, dbin_b],
        leaves,
    }
}

fn node_id(arena: &NodeArena, handle: NodeHandle) -> u64 {
    arena.get(handle).expect("resident").node_id()
}

#[test]
fn test_variant_classification() {
    let ids = NodeIdAllocator::new();
    let f = fixture(&ids);
    let get = |h| f.arena.get(h).expect("resident");

    assert_eq!(get(f.root).level(), MAIN_LEVEL | 2);
    assert_eq!(get(f.bin).level(), BIN_LEVEL);
    assert_eq!(get(f.din).level(), DUPTREE_LEVEL | 2);
    assert_eq!(get(f.dbins[0]).level(), DBIN_LEVEL);
    assert_eq!(get(f.leaves[0]).level(), 0);

    assert!(!get(f.root).contains_duplicates());
    assert!(!get(f.bin).contains_duplicates());
    assert!(get(f.din).contains_duplicates());
    assert!(get(f.dbins[0]).contains_duplicates());
    assert!(!get(f.leaves[0]).contains_duplicates());

    for h in [f.root, f.bin, f.din, f.dbins[0]] {
        assert_eq!(get(h).memory_size_included_by_parent(), 0);
        assert!(get(h).is_internal());
    }
    assert!(get(f.leaves[0]).memory_size_included_by_parent() > 0);
}

#[test]
fn test_can_be_ancestor() {
    let ids = NodeIdAllocator::new();
    let cases: Vec<(Node, bool, bool)> = vec![
        (Node::In(In::new(&ids, 2, Vec::new(), 4).expect("in")), true, true),
        (Node::Bin(Bin::new(&ids, Vec::new(), 4).expect("bin")), false, true),
        (
            Node::Din(Din::new(&ids, 2, Vec::new(), 4, None).expect("din")),
            false,
            true,
        ),
        (Node::Dbin(Dbin::new(&ids, Vec::new(), 4).expect("dbin")), false, false),
        (Node::Ln(Ln::new(&ids, Vec::new()).expect("ln")), false, false),
        (Node::DupCountLn(DupCountLn::new(&ids, 0)), false, false),
    ];
    for (node, of_main, of_dup) in cases {
        assert_eq!(node.can_be_ancestor(false), of_main, "{}", node.get_type());
        assert_eq!(node.can_be_ancestor(true), of_dup, "{}", node.get_type());
    }
}

#[test]
fn test_is_sought_node_bumps_generation() {
    let ids = NodeIdAllocator::new();
    let clock = GenerationClock::new();
    let mut bin = Node::Bin(Bin::new(&ids, Vec::new(), 4).expect("bin"));
    let id = bin.node_id();

    assert!(!bin.is_sought_node(id + 1, Some(&clock)));
    assert_eq!(clock.current(), 0);

    assert!(bin.is_sought_node(id, None));
    assert_eq!(bin.as_internal().expect("internal").generation(), 0);

    assert!(bin.is_sought_node(id, Some(&clock)));
    assert_eq!(bin.as_internal().expect("internal").generation(), 1);
    clock.next_generation();
    assert!(bin.is_sought_node(id, Some(&clock)));
    assert_eq!(bin.as_internal().expect("internal").generation(), 3);

    let mut ln = Node::Ln(Ln::new(&ids, Vec::new()).expect("ln"));
    let ln_id = ln.node_id();
    assert!(!ln.is_sought_node(ln_id, Some(&clock)));
    assert_eq!(clock.current(), 3);
}

#[test]
fn test_match_ln_in_duplicate_subtree() {
    let ids = NodeIdAllocator::new();
    let f = fixture(&ids);
    let din = f.arena.get(f.din).expect("din");

    let target = node_id(&f.arena, f.leaves[2]);
    let mut location = TreeLocation::default();
    assert!(
        din.match_ln_by_node_id(f.din, &f.arena, &mut location, target)
            .expect("searchable")
    );
    assert_eq!(location.bin, Some(f.dbins[1]));
    assert_eq!(location.index, 0);
    assert_eq!(location.ln_key.as_deref(), Some(b"2a".as_slice()));
    assert_eq!(location.child_lsn, Some(100));

    let target = node_id(&f.arena, f.leaves[1]);
    location.reset();
    assert!(
        din.match_ln_by_node_id(f.din, &f.arena, &mut location, target)
            .expect("searchable")
    );
    assert_eq!(location.bin, Some(f.dbins[0]));
    assert_eq!(location.index, 1);

    // The BIN's own leaf is outside the duplicate subtree.
    let outside = node_id(&f.arena, f.leaves[3]);
    location.reset();
    assert!(
        !din.match_ln_by_node_id(f.din, &f.arena, &mut location, outside)
            .expect("searchable")
    );
    assert_eq!(location, TreeLocation::default());
}

#[test]
fn test_match_ln_fails_outside_duplicate_tree() {
    let ids = NodeIdAllocator::new();
    let f = fixture(&ids);
    let target = node_id(&f.arena, f.leaves[0]);
    let mut location = TreeLocation::default();

    for (handle, node_type) in [(f.root, "IN"), (f.bin, "BIN"), (f.leaves[0], "LN")] {
        let err = f
            .arena
            .get(handle)
            .expect("resident")
            .match_ln_by_node_id(handle, &f.arena, &mut location, target)
            .expect_err("not searchable");
        match err {
            NodeError::UnsupportedOperation {
                operation,
                node_type: actual,
            } => {
                assert_eq!(operation, "match_ln_by_node_id");
                assert_eq!(actual, node_type);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(
        DupCountLn::new(&ids, 1)
            .match_ln_by_node_id(f.din, &f.arena, &mut location, target)
            .expect_err("not searchable")
            .to_string(),
        "match_ln_by_node_id called on DupCountLN"
    );
}

#[test]
fn test_is_valid_for_delete() {
    let ids = NodeIdAllocator::new();
    let mut arena = NodeArena::new();

    // Empty nodes are deletable.
    let empty_in = arena.insert(Node::In(In::new(&ids, 2, Vec::new(), 4).expect("in")));
    let empty_bin = arena.insert(Node::Bin(Bin::new(&ids, Vec::new(), 4).expect("bin")));
    assert!(arena.get(empty_in).expect("in").is_valid_for_delete(&arena).expect("check"));

    // An IN whose single child is an empty BIN is deletable.
    let parent = arena.insert(internal_with_entries(
        Node::In(In::new(&ids, 3, Vec::new(), 4).expect("in")),
        &[b"k"],
    ));
    let parent_node = arena.get(parent).expect("in");
    // Not resident yet: cannot prove it.
    assert!(!parent_node.is_valid_for_delete(&arena).expect("check"));
    arena.attach_child(parent, 0, empty_bin).expect("attach");
    let parent_node = arena.get(parent).expect("in");
    assert!(parent_node.is_valid_for_delete(&arena).expect("check"));

    // A BIN holding a live LN is not.
    let bin = arena.insert(internal_with_entries(
        Node::Bin(Bin::new(&ids, Vec::new(), 4).expect("bin")),
        &[b"x", b"y"],
    ));
    let ln = arena.insert(Node::Ln(Ln::new(&ids, b"v".to_vec()).expect("ln")));
    arena.attach_child(bin, 1, ln).expect("attach");
    assert!(!arena.get(bin).expect("bin").is_valid_for_delete(&arena).expect("check"));

    // Known-deleted entries do not count for a BIN.
    {
        let body = arena.get_mut(bin).expect("bin").as_internal_mut().expect("internal");
        body.set_known_deleted(0, true).expect("flag");
        body.set_known_deleted(1, true).expect("flag");
    }
    assert!(arena.get(bin).expect("bin").is_valid_for_delete(&arena).expect("check"));

    // One live entry: its LN decides, and an LN is never deletable here.
    arena
        .get_mut(bin)
        .expect("bin")
        .as_internal_mut()
        .expect("internal")
        .set_known_deleted(1, false)
        .expect("flag");
    assert!(!arena.get(bin).expect("bin").is_valid_for_delete(&arena).expect("check"));

    // An IN counts every entry, deleted or not.
    let in_two = arena.insert(internal_with_entries(
        Node::In(In::new(&ids, 2, Vec::new(), 4).expect("in")),
        &[b"a", b"b"],
    ));
    {
        let body = arena.get_mut(in_two).expect("in").as_internal_mut().expect("internal");
        body.set_known_deleted(0, true).expect("flag");
    }
    assert!(!arena.get(in_two).expect("in").is_valid_for_delete(&arena).expect("check"));
}

#[test]
fn test_rebuild_in_list_registers_only_internal_nodes() {
    let ids = NodeIdAllocator::new();
    let f = fixture(&ids);
    let mut list = InList::new();
    f.arena.rebuild_in_list(f.root, &mut list).expect("rebuild");

    assert_eq!(list.len(), 5);
    for h in [f.root, f.bin, f.din, f.dbins[0], f.dbins[1]] {
        assert!(list.contains(h));
        assert_eq!(list.node_id(h), Some(node_id(&f.arena, h)));
    }
    for h in &f.leaves {
        assert!(!list.contains(*h));
    }
}

#[test]
fn test_subtree_removal_accounting() {
    let ids = NodeIdAllocator::new();
    let mut f = fixture(&ids);
    let mut list = InList::new();
    let mut tracker = ObsoleteTracker::new();
    f.arena.rebuild_in_list(f.root, &mut list).expect("rebuild");

    // Remove the duplicate subtree: DIN + 2 DBINs (k = 3) and 3 LNs (m = 3).
    let removed = f
        .arena
        .remove_subtree(f.din, &mut list, &mut tracker)
        .expect("remove");
    assert_eq!(removed, 6);
    assert_eq!(list.remove_count(), 3);
    assert_eq!(tracker.obsolete_nodes(), 3);
    assert_eq!(list.len(), 2);

    let mut reported: Vec<_> = tracker.take_recent().iter().map(|o| o.log_type).collect();
    reported.sort();
    assert_eq!(
        reported,
        vec![LogEntryType::Din, LogEntryType::Dbin, LogEntryType::Dbin]
    );

    // The parent still points at the freed slot until the tree unlinks it.
    assert!(matches!(
        f.arena.subtree(f.bin),
        Err(NodeError::DanglingHandle(h)) if h == f.din
    ));
    f.arena
        .get_mut(f.bin)
        .expect("bin")
        .as_internal_mut()
        .expect("internal")
        .remove_entry(0)
        .expect("unlink");

    let removed = f
        .arena
        .remove_subtree(f.root, &mut list, &mut tracker)
        .expect("remove");
    assert_eq!(removed, 3);
    assert_eq!(list.remove_count(), 5);
    assert_eq!(tracker.obsolete_nodes(), 5);
    assert!(list.is_empty());
    assert!(f.arena.is_empty());
}

#[test]
fn test_removal_of_unregistered_node_is_a_contract_violation() {
    let ids = NodeIdAllocator::new();
    let f = fixture(&ids);
    let mut list = InList::new();
    let mut tracker = ObsoleteTracker::new();

    let bin = f.arena.get(f.bin).expect("bin");
    let err = bin
        .account_for_subtree_removal(f.bin, &f.arena, &mut list, &mut tracker)
        .expect_err("bin was never registered");
    assert!(matches!(err, NodeError::StructuralContractViolation(_)));
    assert_eq!(tracker.obsolete_nodes(), 0);

    // Registered once, removed once; a second removal is caught.
    f.arena.rebuild_in_list(f.din, &mut list).expect("rebuild");
    let din = f.arena.get(f.din).expect("din");
    din.account_for_subtree_removal(f.din, &f.arena, &mut list, &mut tracker)
        .expect("first removal");
    assert_eq!(tracker.obsolete_nodes(), 3);
    assert!(
        din.account_for_subtree_removal(f.din, &f.arena, &mut list, &mut tracker)
            .is_err()
    );
    assert_eq!(tracker.obsolete_nodes(), 3);
}

#[test]
fn test_failed_subtree_removal_changes_nothing() {
    let ids = NodeIdAllocator::new();
    let mut f = fixture(&ids);
    let mut list = InList::new();
    let mut tracker = ObsoleteTracker::new();
    f.arena.rebuild_in_list(f.root, &mut list).expect("rebuild");
    assert!(list.remove(f.dbins[1]));

    let err = f
        .arena
        .remove_subtree(f.root, &mut list, &mut tracker)
        .expect_err("dbin is not registered");
    assert!(matches!(err, NodeError::StructuralContractViolation(_)));
    assert_eq!(list.len(), 4);
    assert_eq!(list.remove_count(), 1);
    assert_eq!(tracker.obsolete_nodes(), 0);
    assert_eq!(f.arena.len(), 9);

    // Once the registry is repaired the retry accounts for each node once.
    list.add(f.dbins[1], node_id(&f.arena, f.dbins[1]));
    let removed = f
        .arena
        .remove_subtree(f.root, &mut list, &mut tracker)
        .expect("remove");
    assert_eq!(removed, 9);
    assert_eq!(tracker.obsolete_nodes(), 5);
    assert!(list.is_empty());
    assert!(f.arena.is_empty());
}

#[test]
fn test_removal_reports_logged_size() {
    let ids = NodeIdAllocator::new();
    let mut arena = NodeArena::new();
    let mut bin = internal_with_entries(
        Node::Bin(Bin::new(&ids, b"id".to_vec(), 4).expect("bin")),
        &[b"k"],
    );
    bin.post_log_work(4096);
    let size = bin.log_size();
    assert_eq!(bin.as_internal().expect("internal").last_full_size(), Some(size));

    // Changed in memory since it was logged: the logged version is what goes stale.
    bin.as_internal_mut()
        .expect("internal")
        .add_entry(vec![7; 100], 1)
        .expect("entry");
    assert!(bin.log_size() > size);
    let handle = arena.insert(bin);

    let mut list = InList::new();
    let mut tracker = ObsoleteTracker::new();
    list.add(handle, node_id(&arena, handle));
    arena.remove_subtree(handle, &mut list, &mut tracker).expect("remove");

    let recent = tracker.take_recent();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].lsn, Some(4096));
    assert_eq!(recent[0].size, size);
    assert_eq!(tracker.obsolete_bytes(), size as u64);
}

#[test]
fn test_removal_of_never_logged_node_reports_no_bytes() {
    let ids = NodeIdAllocator::new();
    let mut arena = NodeArena::new();
    let handle = arena.insert(internal_with_entries(
        Node::Dbin(Dbin::new(&ids, Vec::new(), 4).expect("dbin")),
        &[b"k"],
    ));
    let mut list = InList::new();
    let mut tracker = ObsoleteTracker::new();
    arena.rebuild_in_list(handle, &mut list).expect("rebuild");
    arena.remove_subtree(handle, &mut list, &mut tracker).expect("remove");

    let recent = tracker.take_recent();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].lsn, None);
    assert_eq!(recent[0].size, 0);
    assert_eq!(tracker.obsolete_bytes(), 0);
}

fn random_key(rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.random_range(0..24);
    (0..len).map(|_| rng.random()).collect()
}

fn random_internal(ids: &NodeIdAllocator, rng: &mut impl Rng, kind: LogEntryType) -> Node {
    let max_entries = rng.random_range(1..32u16);
    let key = random_key(rng);
    let mut node = match kind {
        LogEntryType::In => Node::In(In::new(ids, rng.random_range(2..10), key, max_entries).expect("in")),
        LogEntryType::Bin => Node::Bin(Bin::new(ids, key, max_entries).expect("bin")),
        LogEntryType::Din => {
            let lsn = rng.random_bool(0.5).then(|| rng.random_range(0..1_000_000));
            Node::Din(Din::new(ids, 2, key, max_entries, lsn).expect("din"))
        }
        _ => Node::Dbin(Dbin::new(ids, key, max_entries).expect("dbin")),
    };
    let body = node.as_internal_mut().expect("internal");
    body.set_is_root(rng.random_bool(0.3));
    for _ in 0..rng.random_range(0..=max_entries) {
        let _ = body.add_entry(random_key(rng), rng.random());
    }
    for i in 0..body.n_entries() {
        body.set_known_deleted(i, rng.random_bool(0.2)).expect("flag");
    }
    node
}

#[test]
fn test_random_roundtrip_every_variant() {
    let ids = NodeIdAllocator::new();
    let mut rng = rand::rng();

    for _ in 0..50 {
        let mut nodes = vec![
            random_internal(&ids, &mut rng, LogEntryType::In),
            random_internal(&ids, &mut rng, LogEntryType::Bin),
            random_internal(&ids, &mut rng, LogEntryType::Din),
            random_internal(&ids, &mut rng, LogEntryType::Dbin),
            Node::DupCountLn(DupCountLn::new(&ids, rng.random())),
        ];
        let data = if rng.random_bool(0.2) {
            None
        } else {
            Some(random_key(&mut rng))
        };
        nodes.push(Node::Ln(Ln::with_id(ids.next_id(), data)));

        for node in nodes {
            let buf = node.marshal();
            assert_eq!(buf.len(), node.log_size(), "{}", node.short_description());

            let mut reader = LogReader::new(&buf);
            let restored =
                Node::read_from_log(node.log_type(), &mut reader, LOG_VERSION).expect("read");
            assert_eq!(reader.position(), restored.log_size());
            assert_eq!(reader.remaining(), 0);
            assert_eq!(restored.node_id(), node.node_id());
            assert_eq!(restored.log_type(), node.log_type());
            assert_eq!(restored.marshal(), buf);

            let mut expected = String::new();
            let mut actual = String::new();
            node.dump_log(&mut expected, true);
            restored.dump_log(&mut actual, true);
            assert_eq!(actual, expected);
        }
    }
}

#[test]
fn test_read_version_one_internal_record() {
    // Version 1: no known_deleted byte per entry.
    let mut buf = Vec::new();
    write_node_id(&mut buf, 17);
    codec::write_u32(&mut buf, BIN_LEVEL);
    codec::write_u16(&mut buf, 4);
    codec::write_prefixed_bytes(&mut buf, b"id");
    codec::write_bool(&mut buf, true);
    codec::write_u16(&mut buf, 2);
    codec::write_prefixed_bytes(&mut buf, b"k1");
    codec::write_u64(&mut buf, 11);
    codec::write_prefixed_bytes(&mut buf, b"k2");
    codec::write_u64(&mut buf, 22);

    let mut reader = LogReader::new(&buf);
    let node = Node::read_from_log(LogEntryType::Bin, &mut reader, 1).expect("read v1");
    assert_eq!(reader.remaining(), 0);
    assert_eq!(node.node_id(), 17);

    let body = node.as_internal().expect("internal");
    assert!(body.is_root());
    assert_eq!(body.identifier_key(), b"id");
    assert_eq!(body.n_entries(), 2);
    assert_eq!(body.entries()[1].lsn, 22);
    assert!(body.entries().iter().all(|e| !e.known_deleted));

    // Rewritten at the current version, the record grows by one byte per entry.
    assert_eq!(node.log_size(), buf.len() + 2);
}

#[test]
fn test_unsupported_versions() {
    let ln = Node::Ln(Ln::with_id(1, Some(b"x".to_vec())));
    let buf = ln.marshal();
    for version in [0, LOG_VERSION + 1, u8::MAX] {
        let mut reader = LogReader::new(&buf);
        let err = Node::read_from_log(LogEntryType::Ln, &mut reader, version)
            .expect_err("unsupported version");
        assert!(matches!(
            err,
            LogError::UnsupportedVersion { entry_type: LogEntryType::Ln, version: v } if v == version
        ));
        assert_eq!(reader.position(), 0);
    }
}

#[test]
fn test_internal_readers_check_version() {
    let ids = NodeIdAllocator::new();
    let mut bin = Bin::new(&ids, Vec::new(), 4).expect("bin");
    bin.body_mut().add_entry(b"k".to_vec(), 5).expect("entry");
    let buf = Node::Bin(bin).marshal();

    for version in [0, LOG_VERSION + 1] {
        let mut reader = LogReader::new(&buf);
        assert!(matches!(
            Bin::read_from_log(&mut reader, version),
            Err(LogError::UnsupportedVersion { entry_type: LogEntryType::Bin, version: v })
                if v == version
        ));
        assert_eq!(reader.position(), 0);
    }

    let din = Node::Din(Din::new(&ids, 2, Vec::new(), 4, None).expect("din")).marshal();
    let mut reader = LogReader::new(&din);
    assert!(matches!(
        Din::read_from_log(&mut reader, 0),
        Err(LogError::UnsupportedVersion { entry_type: LogEntryType::Din, .. })
    ));

    let in_node = Node::In(In::new(&ids, 2, Vec::new(), 4).expect("in")).marshal();
    let mut reader = LogReader::new(&in_node);
    assert!(In::read_from_log(&mut reader, 3).is_err());

    let dbin = Node::Dbin(Dbin::new(&ids, Vec::new(), 4).expect("dbin")).marshal();
    let mut reader = LogReader::new(&dbin);
    assert!(Dbin::read_from_log(&mut reader, 0).is_err());
    let mut reader = LogReader::new(&dbin);
    assert!(Dbin::read_from_log(&mut reader, LOG_VERSION).is_ok());
}

#[test]
fn test_read_rejects_entry_count_over_fanout() {
    let mut buf = Vec::new();
    write_node_id(&mut buf, 1);
    codec::write_u32(&mut buf, MAIN_LEVEL | 2);
    codec::write_u16(&mut buf, 1);
    codec::write_prefixed_bytes(&mut buf, b"");
    codec::write_bool(&mut buf, false);
    codec::write_u16(&mut buf, 2);

    let mut reader = LogReader::new(&buf);
    assert!(matches!(
        Node::read_from_log(LogEntryType::In, &mut reader, LOG_VERSION),
        Err(LogError::InvalidField("n_entries"))
    ));
}

#[test]
fn test_add_entry_keeps_key_order() {
    let ids = NodeIdAllocator::new();
    let mut bin = Bin::new(&ids, Vec::new(), 8).expect("bin");
    let body = bin.body_mut();
    assert_eq!(body.add_entry(b"m".to_vec(), 1).expect("add"), 0);
    assert_eq!(body.add_entry(b"a".to_vec(), 2).expect("add"), 0);
    assert_eq!(body.add_entry(b"z".to_vec(), 3).expect("add"), 2);

    body.set_known_deleted(1, true).expect("flag");
    // Re-adding an existing key refreshes it in place.
    assert_eq!(body.add_entry(b"m".to_vec(), 9).expect("add"), 1);
    assert_eq!(body.entry(1).expect("entry").lsn, 9);
    assert!(!body.entry(1).expect("entry").known_deleted);
    assert_eq!(body.n_entries(), 3);

    assert!(matches!(
        body.set_lsn(3, 0),
        Err(NodeError::IndexOutOfRange { index: 3, n_entries: 3 })
    ));
    assert!(matches!(
        body.add_entry(vec![0; usize::from(u16::MAX) + 1], 0),
        Err(NodeError::KeyTooLarge(_))
    ));
}

#[test]
fn test_diagnostics() {
    let ids = NodeIdAllocator::new();
    let mut din = Node::Din(Din::new(&ids, 2, vec![0xab], 4, Some(0x10)).expect("din"));
    din.as_internal_mut()
        .expect("internal")
        .add_entry(vec![0x01], 0x20)
        .expect("entry");

    assert_eq!(din.to_string(), "<node>1</node>");
    assert_eq!(din.dump_string(4, false), "    1");
    assert_eq!(din.short_description(), "<DIN/1");

    let mut out = String::new();
    din.dump_log(&mut out, false);
    assert_eq!(
        out,
        "<din><node>1</node><key v=\"ab\"/><isRoot val=\"false\"/><level val=\"20002\"/>\
         <dupCountLN lsn=\"0x10\"/></din>"
    );

    out.clear();
    din.dump_log(&mut out, true);
    assert!(out.contains(
        "<entries numEntries=\"1\"><ref knownDeleted=\"false\"><key v=\"01\"/><lsn val=\"0x20\"/></ref></entries>"
    ));
}

#[test]
fn test_set_node_id_hook() {
    let ids = NodeIdAllocator::new();
    let mut node = Node::Dbin(Dbin::new(&ids, Vec::new(), 4).expect("dbin"));
    node.set_node_id(42);
    assert_eq!(node.node_id(), 42);

    let buf = node.marshal();
    assert_eq!(&buf[..8], &42u64.to_be_bytes());
}

#[test]
fn test_post_fetch_init_and_post_log_work() {
    let ids = NodeIdAllocator::new();
    let mut in_node = Node::In(In::new(&ids, 2, Vec::new(), 4).expect("in"));
    in_node.post_fetch_init(crate::tree::DatabaseId(9), 300);
    let body = in_node.as_internal().expect("internal");
    assert_eq!(body.database_id(), Some(crate::tree::DatabaseId(9)));
    assert_eq!(body.last_full_lsn(), Some(300));
    assert_eq!(body.last_full_size(), Some(in_node.log_size()));

    in_node.post_log_work(900);
    assert_eq!(in_node.as_internal().expect("internal").last_full_lsn(), Some(900));

    // Leaves have nothing to initialize.
    let mut ln = Node::Ln(Ln::new(&ids, b"v".to_vec()).expect("ln"));
    ln.post_fetch_init(crate::tree::DatabaseId(9), 300);
    ln.post_log_work(900);
    assert!(ln.as_internal().is_none());
}
