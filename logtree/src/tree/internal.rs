//! Internal node variants: IN, BIN, DIN and DBIN.
//!
//! All four share an [`InternalBody`]: identity, level, identifier key and a
//! sorted array of child entries. The variants differ only in how they answer
//! the structural queries of the node contract:
//!
//! | variant | duplicates | ancestor of             | delete check     |
//! |---------|------------|-------------------------|------------------|
//! | IN      | no         | anything                | all entries      |
//! | BIN     | no         | duplicate-tree nodes    | live entries     |
//! | DIN     | yes        | duplicate-tree nodes    | all entries      |
//! | DBIN    | yes        | nothing                 | live entries     |
//!
//! # Record Format
//!
//! ```text
//! id (8) | level (4) | max_entries (2) | identifier_key (2 + n) | is_root (1)
//! n_entries (2) | n_entries * [ key (2 + n) | lsn (8) | known_deleted (1) ]
//! ```
//!
//! `known_deleted` is absent from version 1 records. A DIN appends the LSN of
//! its duplicate count leaf (8 bytes, `NULL_LSN` if none).

use std::fmt::Write;

use crate::log::codec::{self, LogError, LogReader, NODE_ID_SIZE, prefixed_bytes_size};
use crate::log::entry::{read_node_id, write_node_id};
use crate::log::{LogEntryType, LogReadable, Loggable, Lsn, NULL_LSN};
use crate::tree::{
    DatabaseId, GenerationClock, NodeArena, NodeError, NodeHandle, NodeId, NodeIdAllocator,
    ObsoleteNode, ResidentNodeRegistry, TreeLocation, TreeNode, UtilizationTracker,
};

/// Flag carried by the level of every main-tree internal node.
pub const MAIN_LEVEL: u32 = 0x1_0000;
/// Flag carried by the level of every duplicate-tree internal node.
pub const DUPTREE_LEVEL: u32 = 0x2_0000;
/// Mask extracting the depth from a level.
pub const LEVEL_MASK: u32 = 0x0_ffff;
pub const BIN_LEVEL: u32 = MAIN_LEVEL | 1;
pub const DBIN_LEVEL: u32 = DUPTREE_LEVEL | 1;

/// Fixed part of an internal record: id, level, `max_entries`, `is_root`, `n_entries`.
const FIXED_SIZE: usize = NODE_ID_SIZE + 4 + 2 + 1 + 2;
/// Per-entry overhead beyond the key: lsn and `known_deleted`.
const ENTRY_FIXED_SIZE: usize = 8 + 1;

/// A slot in an internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub key: Vec<u8>,
    /// Location of the child's latest logged version.
    pub lsn: Lsn,
    /// The child is deleted and only awaits compression.
    pub known_deleted: bool,
    /// The child, if resident. Never logged.
    pub target: Option<NodeHandle>,
}

/// State shared by every internal node variant.
#[derive(Debug)]
pub struct InternalBody {
    id: NodeId,
    level: u32,
    max_entries: u16,
    identifier_key: Vec<u8>,
    is_root: bool,
    entries: Vec<ChildEntry>,
    generation: u64,
    last_full_lsn: Option<Lsn>,
    last_full_size: Option<usize>,
    database_id: Option<DatabaseId>,
}

impl InternalBody {
    fn new(
        id: NodeId,
        level: u32,
        identifier_key: Vec<u8>,
        max_entries: u16,
    ) -> Result<Self, NodeError> {
        check_key(&identifier_key)?;
        Ok(Self {
            id,
            level,
            max_entries,
            identifier_key,
            is_root: false,
            entries: Vec::new(),
            generation: 0,
            last_full_lsn: None,
            last_full_size: None,
            database_id: None,
        })
    }

    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub const fn max_entries(&self) -> u16 {
        self.max_entries
    }

    #[must_use]
    pub fn identifier_key(&self) -> &[u8] {
        &self.identifier_key
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.is_root
    }

    pub const fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root;
    }

    #[must_use]
    pub fn entries(&self) -> &[ChildEntry] {
        &self.entries
    }

    #[must_use]
    pub fn n_entries(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= usize::from(self.max_entries)
    }

    /// Recency stamp from the last search that stopped here.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Location of the last full version written or read.
    #[must_use]
    pub const fn last_full_lsn(&self) -> Option<Lsn> {
        self.last_full_lsn
    }

    /// Body size of the version at `last_full_lsn`.
    #[must_use]
    pub const fn last_full_size(&self) -> Option<usize> {
        self.last_full_size
    }

    #[must_use]
    pub const fn database_id(&self) -> Option<DatabaseId> {
        self.database_id
    }

    pub fn entry(&self, index: usize) -> Result<&ChildEntry, NodeError> {
        self.entries.get(index).ok_or(NodeError::IndexOutOfRange {
            index,
            n_entries: self.entries.len(),
        })
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut ChildEntry, NodeError> {
        let n_entries = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(NodeError::IndexOutOfRange { index, n_entries })
    }

    /// Insert an entry in key order, or refresh the entry already holding
    /// `key`. Returns the entry's index.
    pub fn add_entry(&mut self, key: Vec<u8>, lsn: Lsn) -> Result<usize, NodeError> {
        check_key(&key)?;
        match self
            .entries
            .binary_search_by(|e| e.key.as_slice().cmp(key.as_slice()))
        {
            Ok(index) => {
                let entry = &mut self.entries[index];
                entry.lsn = lsn;
                entry.known_deleted = false;
                Ok(index)
            }
            Err(index) => {
                if self.is_full() {
                    return Err(NodeError::NodeFull {
                        node_id: self.id,
                        max_entries: self.max_entries,
                    });
                }
                self.entries.insert(
                    index,
                    ChildEntry {
                        key,
                        lsn,
                        known_deleted: false,
                        target: None,
                    },
                );
                Ok(index)
            }
        }
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<ChildEntry, NodeError> {
        self.entry(index)?;
        Ok(self.entries.remove(index))
    }

    pub fn set_target(&mut self, index: usize, target: Option<NodeHandle>) -> Result<(), NodeError> {
        self.entry_mut(index)?.target = target;
        Ok(())
    }

    pub fn set_lsn(&mut self, index: usize, lsn: Lsn) -> Result<(), NodeError> {
        self.entry_mut(index)?.lsn = lsn;
        Ok(())
    }

    pub fn set_known_deleted(&mut self, index: usize, known_deleted: bool) -> Result<(), NodeError> {
        self.entry_mut(index)?.known_deleted = known_deleted;
        Ok(())
    }

    fn resident_children(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.entries.iter().filter_map(|e| e.target)
    }

    fn is_sought(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        if self.id != node_id {
            return false;
        }
        if let Some(clock) = generations {
            self.generation = clock.next_generation();
        }
        true
    }

    /// A subtree is deletable when at most one entry passes `counts`, and
    /// that entry's child is resident and itself deletable.
    fn valid_for_delete(
        &self,
        arena: &NodeArena,
        counts: impl Fn(&ChildEntry) -> bool,
    ) -> Result<bool, NodeError> {
        let mut live = self.entries.iter().filter(|&e| counts(e));
        match (live.next(), live.next()) {
            (None, _) => Ok(true),
            (Some(entry), None) => match entry.target {
                Some(child) => arena.get(child)?.is_valid_for_delete(arena),
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }

    fn register(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        registry.add(handle, self.id);
        for child in self.resident_children() {
            arena.get(child)?.rebuild_in_list(child, arena, registry)?;
        }
        Ok(())
    }

    fn deregister(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
        obsolete: ObsoleteNode,
    ) -> Result<(), NodeError> {
        if !registry.remove(handle) {
            tracing::warn!(node_id = self.id, %handle, "removing internal node missing from INList");
            return Err(NodeError::StructuralContractViolation(format!(
                "node {} at {handle} is not on the INList",
                self.id
            )));
        }
        tracker.count_obsolete_node(obsolete);
        for child in self.resident_children() {
            arena
                .get(child)?
                .account_for_subtree_removal(child, arena, registry, tracker)?;
        }
        Ok(())
    }

    /// The last logged version, as it was written.
    const fn obsolete(&self, log_type: LogEntryType) -> ObsoleteNode {
        ObsoleteNode {
            node_id: self.id,
            log_type,
            lsn: self.last_full_lsn,
            size: match self.last_full_size {
                Some(size) => size,
                None => 0,
            },
        }
    }

    const fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn, size: usize) {
        self.database_id = Some(db);
        self.last_full_lsn = Some(source_lsn);
        self.last_full_size = Some(size);
    }

    const fn post_log_work(&mut self, lsn: Lsn, size: usize) {
        self.last_full_lsn = Some(lsn);
        self.last_full_size = Some(size);
    }

    fn log_size(&self) -> usize {
        FIXED_SIZE
            + prefixed_bytes_size(&self.identifier_key)
            + self
                .entries
                .iter()
                .map(|e| prefixed_bytes_size(&e.key) + ENTRY_FIXED_SIZE)
                .sum::<usize>()
    }

    #[allow(clippy::cast_possible_truncation)] // n_entries <= max_entries <= u16::MAX
    fn write_to_log(&self, buf: &mut Vec<u8>) {
        write_node_id(buf, self.id);
        codec::write_u32(buf, self.level);
        codec::write_u16(buf, self.max_entries);
        codec::write_prefixed_bytes(buf, &self.identifier_key);
        codec::write_bool(buf, self.is_root);
        codec::write_u16(buf, self.entries.len() as u16);
        for entry in &self.entries {
            codec::write_prefixed_bytes(buf, &entry.key);
            codec::write_u64(buf, entry.lsn);
            codec::write_bool(buf, entry.known_deleted);
        }
    }

    fn read_from_log(
        reader: &mut LogReader<'_>,
        entry_type: LogEntryType,
        version: u8,
    ) -> Result<Self, LogError> {
        entry_type.check_version(version)?;
        let id = read_node_id(reader)?;
        let level = reader.read_u32()?;
        let max_entries = reader.read_u16()?;
        let identifier_key = reader.read_prefixed_bytes()?;
        let is_root = reader.read_bool()?;
        let n_entries = reader.read_u16()?;
        if n_entries > max_entries {
            return Err(LogError::InvalidField("n_entries"));
        }

        let mut entries = Vec::with_capacity(usize::from(n_entries));
        for _ in 0..n_entries {
            let key = reader.read_prefixed_bytes()?;
            let lsn = reader.read_u64()?;
            let known_deleted = if version >= 2 {
                reader.read_bool()?
            } else {
                false
            };
            entries.push(ChildEntry {
                key,
                lsn,
                known_deleted,
                target: None,
            });
        }

        Ok(Self {
            id,
            level,
            max_entries,
            identifier_key,
            is_root,
            entries,
            generation: 0,
            last_full_lsn: None,
            last_full_size: None,
            database_id: None,
        })
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        let _ = write!(
            out,
            "<node>{}</node><key v=\"{}\"/><isRoot val=\"{}\"/><level val=\"{:x}\"/>",
            self.id,
            codec::hex(&self.identifier_key),
            self.is_root,
            self.level
        );
        if verbose {
            let _ = write!(out, "<entries numEntries=\"{}\">", self.entries.len());
            for entry in &self.entries {
                let _ = write!(
                    out,
                    "<ref knownDeleted=\"{}\"><key v=\"{}\"/><lsn val=\"{:#x}\"/></ref>",
                    entry.known_deleted,
                    codec::hex(&entry.key),
                    entry.lsn
                );
            }
            out.push_str("</entries>");
        }
    }
}

fn check_key(key: &[u8]) -> Result<(), NodeError> {
    if key.len() > usize::from(u16::MAX) {
        return Err(NodeError::KeyTooLarge(key.len()));
    }
    Ok(())
}

/// Main-tree internal node above the bottom level.
#[derive(Debug)]
pub struct In {
    body: InternalBody,
}

impl In {
    /// Create an IN at tree depth `depth` with a fresh node id.
    pub fn new(
        ids: &NodeIdAllocator,
        depth: u32,
        identifier_key: Vec<u8>,
        max_entries: u16,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            body: InternalBody::new(
                ids.next_id(),
                MAIN_LEVEL | (depth & LEVEL_MASK),
                identifier_key,
                max_entries,
            )?,
        })
    }

    #[must_use]
    pub const fn body(&self) -> &InternalBody {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut InternalBody {
        &mut self.body
    }
}

impl TreeNode for In {
    fn node_id(&self) -> NodeId {
        self.body.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.body.id = id;
    }

    fn get_type(&self) -> &'static str {
        "IN"
    }

    fn level(&self) -> u32 {
        self.body.level
    }

    fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn) {
        let size = self.log_size();
        self.body.post_fetch_init(db, source_lsn, size);
    }

    fn is_sought_node(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        self.body.is_sought(node_id, generations)
    }

    fn can_be_ancestor(&self, _target_contains_duplicates: bool) -> bool {
        true
    }

    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError> {
        self.body.valid_for_delete(arena, |_| true)
    }

    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        self.body.register(handle, arena, registry)
    }

    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        let obsolete = self.body.obsolete(self.log_type());
        self.body.deregister(handle, arena, registry, tracker, obsolete)
    }
}

impl Loggable for In {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::In
    }

    fn log_size(&self) -> usize {
        self.body.log_size()
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        self.body.write_to_log(buf);
    }

    // Internal nodes are logged under their own latch; nothing moves while
    // the log writer marshals them.
    fn marshal_outside_write_latch(&self) -> bool {
        true
    }

    fn post_log_work(&mut self, lsn: Lsn) {
        let size = self.log_size();
        self.body.post_log_work(lsn, size);
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        out.push_str("<in>");
        self.body.dump_log(out, verbose);
        out.push_str("</in>");
    }
}

impl LogReadable for In {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        Ok(Self {
            body: InternalBody::read_from_log(reader, LogEntryType::In, version)?,
        })
    }
}

/// Bottom internal node of the main tree; its children are leaves or DINs.
#[derive(Debug)]
pub struct Bin {
    body: InternalBody,
}

impl Bin {
    pub fn new(
        ids: &NodeIdAllocator,
        identifier_key: Vec<u8>,
        max_entries: u16,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            body: InternalBody::new(ids.next_id(), BIN_LEVEL, identifier_key, max_entries)?,
        })
    }

    #[must_use]
    pub const fn body(&self) -> &InternalBody {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut InternalBody {
        &mut self.body
    }
}

impl TreeNode for Bin {
    fn node_id(&self) -> NodeId {
        self.body.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.body.id = id;
    }

    fn get_type(&self) -> &'static str {
        "BIN"
    }

    fn level(&self) -> u32 {
        self.body.level
    }

    fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn) {
        let size = self.log_size();
        self.body.post_fetch_init(db, source_lsn, size);
    }

    fn is_sought_node(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        self.body.is_sought(node_id, generations)
    }

    /// A BIN's only internal descendants are duplicate subtrees.
    fn can_be_ancestor(&self, target_contains_duplicates: bool) -> bool {
        target_contains_duplicates
    }

    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError> {
        self.body.valid_for_delete(arena, |e| !e.known_deleted)
    }

    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        self.body.register(handle, arena, registry)
    }

    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        let obsolete = self.body.obsolete(self.log_type());
        self.body.deregister(handle, arena, registry, tracker, obsolete)
    }
}

impl Loggable for Bin {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::Bin
    }

    fn log_size(&self) -> usize {
        self.body.log_size()
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        self.body.write_to_log(buf);
    }

    fn marshal_outside_write_latch(&self) -> bool {
        true
    }

    fn post_log_work(&mut self, lsn: Lsn) {
        let size = self.log_size();
        self.body.post_log_work(lsn, size);
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        out.push_str("<bin>");
        self.body.dump_log(out, verbose);
        out.push_str("</bin>");
    }
}

impl LogReadable for Bin {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        Ok(Self {
            body: InternalBody::read_from_log(reader, LogEntryType::Bin, version)?,
        })
    }
}

/// Internal node of a duplicate subtree.
#[derive(Debug)]
pub struct Din {
    body: InternalBody,
    dup_count_lsn: Option<Lsn>,
}

impl Din {
    pub fn new(
        ids: &NodeIdAllocator,
        depth: u32,
        identifier_key: Vec<u8>,
        max_entries: u16,
        dup_count_lsn: Option<Lsn>,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            body: InternalBody::new(
                ids.next_id(),
                DUPTREE_LEVEL | (depth & LEVEL_MASK),
                identifier_key,
                max_entries,
            )?,
            dup_count_lsn,
        })
    }

    #[must_use]
    pub const fn body(&self) -> &InternalBody {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut InternalBody {
        &mut self.body
    }

    /// Location of this duplicate set's count leaf.
    #[must_use]
    pub const fn dup_count_lsn(&self) -> Option<Lsn> {
        self.dup_count_lsn
    }

    pub const fn set_dup_count_lsn(&mut self, lsn: Option<Lsn>) {
        self.dup_count_lsn = lsn;
    }
}

impl TreeNode for Din {
    fn node_id(&self) -> NodeId {
        self.body.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.body.id = id;
    }

    fn get_type(&self) -> &'static str {
        "DIN"
    }

    fn level(&self) -> u32 {
        self.body.level
    }

    fn contains_duplicates(&self) -> bool {
        true
    }

    fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn) {
        let size = self.log_size();
        self.body.post_fetch_init(db, source_lsn, size);
    }

    fn match_ln_by_node_id(
        &self,
        _handle: NodeHandle,
        arena: &NodeArena,
        location: &mut TreeLocation,
        node_id: NodeId,
    ) -> Result<bool, NodeError> {
        for child in self.body.resident_children() {
            if arena
                .get(child)?
                .match_ln_by_node_id(child, arena, location, node_id)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_sought_node(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        self.body.is_sought(node_id, generations)
    }

    fn can_be_ancestor(&self, target_contains_duplicates: bool) -> bool {
        target_contains_duplicates
    }

    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError> {
        self.body.valid_for_delete(arena, |_| true)
    }

    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        self.body.register(handle, arena, registry)
    }

    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        let obsolete = self.body.obsolete(self.log_type());
        self.body.deregister(handle, arena, registry, tracker, obsolete)
    }
}

impl Loggable for Din {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::Din
    }

    fn log_size(&self) -> usize {
        self.body.log_size() + 8
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        self.body.write_to_log(buf);
        codec::write_u64(buf, self.dup_count_lsn.unwrap_or(NULL_LSN));
    }

    fn marshal_outside_write_latch(&self) -> bool {
        true
    }

    fn post_log_work(&mut self, lsn: Lsn) {
        let size = self.log_size();
        self.body.post_log_work(lsn, size);
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        out.push_str("<din>");
        self.body.dump_log(out, verbose);
        match self.dup_count_lsn {
            Some(lsn) => {
                let _ = write!(out, "<dupCountLN lsn=\"{lsn:#x}\"/>");
            }
            None => out.push_str("<dupCountLN/>"),
        }
        out.push_str("</din>");
    }
}

impl LogReadable for Din {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        let body = InternalBody::read_from_log(reader, LogEntryType::Din, version)?;
        let lsn = reader.read_u64()?;
        Ok(Self {
            body,
            dup_count_lsn: (lsn != NULL_LSN).then_some(lsn),
        })
    }
}

/// Bottom internal node of a duplicate subtree; its children are leaves.
#[derive(Debug)]
pub struct Dbin {
    body: InternalBody,
}

impl Dbin {
    pub fn new(
        ids: &NodeIdAllocator,
        identifier_key: Vec<u8>,
        max_entries: u16,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            body: InternalBody::new(ids.next_id(), DBIN_LEVEL, identifier_key, max_entries)?,
        })
    }

    #[must_use]
    pub const fn body(&self) -> &InternalBody {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut InternalBody {
        &mut self.body
    }
}

impl TreeNode for Dbin {
    fn node_id(&self) -> NodeId {
        self.body.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.body.id = id;
    }

    fn get_type(&self) -> &'static str {
        "DBIN"
    }

    fn level(&self) -> u32 {
        self.body.level
    }

    fn contains_duplicates(&self) -> bool {
        true
    }

    fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn) {
        let size = self.log_size();
        self.body.post_fetch_init(db, source_lsn, size);
    }

    fn match_ln_by_node_id(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        location: &mut TreeLocation,
        node_id: NodeId,
    ) -> Result<bool, NodeError> {
        for (index, entry) in self.body.entries.iter().enumerate() {
            let Some(child) = entry.target else {
                continue;
            };
            let child = arena.get(child)?;
            if !child.is_internal() && child.node_id() == node_id {
                location.bin = Some(handle);
                location.index = index;
                location.ln_key = Some(entry.key.clone());
                location.child_lsn = Some(entry.lsn);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_sought_node(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        self.body.is_sought(node_id, generations)
    }

    fn can_be_ancestor(&self, _target_contains_duplicates: bool) -> bool {
        false
    }

    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError> {
        self.body.valid_for_delete(arena, |e| !e.known_deleted)
    }

    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        self.body.register(handle, arena, registry)
    }

    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        let obsolete = self.body.obsolete(self.log_type());
        self.body.deregister(handle, arena, registry, tracker, obsolete)
    }
}

impl Loggable for Dbin {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::Dbin
    }

    fn log_size(&self) -> usize {
        self.body.log_size()
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        self.body.write_to_log(buf);
    }

    fn marshal_outside_write_latch(&self) -> bool {
        true
    }

    fn post_log_work(&mut self, lsn: Lsn) {
        let size = self.log_size();
        self.body.post_log_work(lsn, size);
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        out.push_str("<dbin>");
        self.body.dump_log(out, verbose);
        out.push_str("</dbin>");
    }
}

impl LogReadable for Dbin {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        Ok(Self {
            body: InternalBody::read_from_log(reader, LogEntryType::Dbin, version)?,
        })
    }
}
