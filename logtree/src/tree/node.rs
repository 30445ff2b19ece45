//! The node contract shared by every B-tree node variant.
//!
//! [`TreeNode`] is the structural half (ancestry, deletability, duplicate
//! search, INList and utilization bookkeeping); the log half lives in
//! [`Loggable`]. Most methods have a default that the leaf-like variants
//! inherit and the internal-like variants override.
//!
//! [`Node`] is the closed set of variants the tree stores in its arena:
//! - `In`, `Bin`: main-tree internal and bottom internal nodes
//! - `Din`, `Dbin`: the same pair inside a duplicate subtree
//! - `Ln`, `DupCountLn`: leaves (record data, duplicate-set size)
//!
//! None of these operations latch anything. Callers hold whatever latches
//! the surrounding tree algorithm requires.

use std::fmt;

use crate::log::{LogEntryType, LogError, LogReadable, LogReader, Loggable, Lsn};
use crate::tree::{
    Bin, Dbin, Din, DupCountLn, GenerationClock, In, InternalBody, Ln, NodeArena, NodeHandle,
    NodeId, ResidentNodeRegistry, UtilizationTracker,
};

/// Opening tag of `dump_string` and `dump_log`.
pub const BEGIN_TAG: &str = "<node>";
/// Closing tag of `dump_string` and `dump_log`.
pub const END_TAG: &str = "</node>";

/// Identity of the database a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId(pub u32);

/// Where a duplicate-subtree search found its leaf.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeLocation {
    /// The DBIN holding the leaf.
    pub bin: Option<NodeHandle>,
    /// Entry index of the leaf within `bin`.
    pub index: usize,
    /// Key of that entry.
    pub ln_key: Option<Vec<u8>>,
    /// Logged location of the leaf, as recorded in `bin`.
    pub child_lsn: Option<Lsn>,
}

impl TreeLocation {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Errors raised by node contract operations.
#[derive(Debug)]
pub enum NodeError {
    /// The operation is not part of this variant's contract.
    UnsupportedOperation {
        operation: &'static str,
        node_type: &'static str,
    },
    /// Bookkeeping found the tree in a state the contract rules out.
    StructuralContractViolation(String),
    /// The handle does not name a resident node.
    DanglingHandle(NodeHandle),
    /// The node already holds `max_entries` entries.
    NodeFull { node_id: NodeId, max_entries: u16 },
    /// Keys are logged with a `u16` length prefix.
    KeyTooLarge(usize),
    /// Leaf data is logged with an `i32` length prefix.
    DataTooLarge(usize),
    /// Entry index past the end of the node.
    IndexOutOfRange { index: usize, n_entries: usize },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperation {
                operation,
                node_type,
            } => write!(f, "{operation} called on {node_type}"),
            Self::StructuralContractViolation(message) => {
                write!(f, "structural contract violation: {message}")
            }
            Self::DanglingHandle(handle) => write!(f, "no resident node at {handle}"),
            Self::NodeFull {
                node_id,
                max_entries,
            } => write!(f, "node {node_id} is full ({max_entries} entries)"),
            Self::KeyTooLarge(len) => {
                write!(f, "key too large: {len} bytes (max {})", u16::MAX)
            }
            Self::DataTooLarge(len) => {
                write!(f, "data too large: {len} bytes (max {})", i32::MAX)
            }
            Self::IndexOutOfRange { index, n_entries } => {
                write!(f, "entry index {index} out of range ({n_entries} entries)")
            }
        }
    }
}

impl std::error::Error for NodeError {}

/// Structural contract every node variant implements.
pub trait TreeNode {
    fn node_id(&self) -> NodeId;

    /// Overwrite the id. Only unit tests may rename a node.
    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId);

    /// Variant name used in diagnostics.
    fn get_type(&self) -> &'static str;

    /// Depth classification. Leaves are always at the bottom, level 0.
    fn level(&self) -> u32 {
        0
    }

    /// True if this is a duplicate-tree internal node.
    fn contains_duplicates(&self) -> bool {
        false
    }

    /// Initialize a node that has just been faulted in from `source_lsn`.
    fn post_fetch_init(&mut self, _db: DatabaseId, _source_lsn: Lsn) {}

    /// Depth-first search of a duplicate subtree for the leaf with `node_id`.
    ///
    /// On a match the location is filled in and `true` returned. Only
    /// duplicate-tree internal nodes can be searched; every other variant
    /// fails so that a misdirected search surfaces immediately.
    ///
    /// No latching is performed.
    fn match_ln_by_node_id(
        &self,
        _handle: NodeHandle,
        _arena: &NodeArena,
        _location: &mut TreeLocation,
        _node_id: NodeId,
    ) -> Result<bool, NodeError> {
        Err(NodeError::UnsupportedOperation {
            operation: "match_ln_by_node_id",
            node_type: self.get_type(),
        })
    }

    /// True if this is an internal node on the search path to `node_id`.
    ///
    /// With a clock, a matching node is stamped with the next generation.
    /// Leaves are never on a search path and keep the default.
    fn is_sought_node(&mut self, _node_id: NodeId, _generations: Option<&GenerationClock>) -> bool {
        false
    }

    /// True if this node can be an ancestor of a node whose
    /// duplicate-bearing classification is `target_contains_duplicates`.
    fn can_be_ancestor(&self, target_contains_duplicates: bool) -> bool;

    /// True if this node is part of a deletable (logically empty) subtree.
    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError>;

    /// Add this node, and its resident descendants, to the INList if it is a
    /// type of node that belongs there.
    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError>;

    /// Remove this node and its resident descendants from the INList and
    /// report their log space as obsolete.
    ///
    /// Stops at the first error, leaving earlier nodes deregistered.
    /// [`NodeArena::remove_subtree`] checks the subtree before calling this.
    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError>;

    /// Approximate in-memory size charged to the parent.
    ///
    /// Internal nodes are charged individually through the INList and return
    /// 0. Leaves are not on the INList, so they report their size here.
    fn memory_size_included_by_parent(&self) -> u64 {
        0
    }

    fn dump_string(&self, n_spaces: usize, dump_tags: bool) -> String {
        let mut out = " ".repeat(n_spaces);
        if dump_tags {
            out.push_str(BEGIN_TAG);
        }
        out.push_str(&self.node_id().to_string());
        if dump_tags {
            out.push_str(END_TAG);
        }
        out
    }

    fn short_description(&self) -> String {
        format!("<{}/{}", self.get_type(), self.node_id())
    }
}

/// A tree node of one of the known variants.
#[derive(Debug)]
pub enum Node {
    In(In),
    Bin(Bin),
    Din(Din),
    Dbin(Dbin),
    Ln(Ln),
    DupCountLn(DupCountLn),
}

macro_rules! dispatch {
    ($node:expr, $inner:ident => $body:expr) => {
        match $node {
            Node::In($inner) => $body,
            Node::Bin($inner) => $body,
            Node::Din($inner) => $body,
            Node::Dbin($inner) => $body,
            Node::Ln($inner) => $body,
            Node::DupCountLn($inner) => $body,
        }
    };
}

impl Node {
    /// Rebuild a node from a record body of type `entry_type`.
    pub fn read_from_log(
        entry_type: LogEntryType,
        reader: &mut LogReader<'_>,
        version: u8,
    ) -> Result<Self, LogError> {
        entry_type.check_version(version)?;
        Ok(match entry_type {
            LogEntryType::In => Self::In(In::read_from_log(reader, version)?),
            LogEntryType::Bin => Self::Bin(Bin::read_from_log(reader, version)?),
            LogEntryType::Din => Self::Din(Din::read_from_log(reader, version)?),
            LogEntryType::Dbin => Self::Dbin(Dbin::read_from_log(reader, version)?),
            LogEntryType::Ln => Self::Ln(Ln::read_from_log(reader, version)?),
            LogEntryType::DupCountLn => {
                Self::DupCountLn(DupCountLn::read_from_log(reader, version)?)
            }
        })
    }

    /// Marshal the record body into a fresh buffer of exactly `log_size` bytes.
    #[must_use]
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.log_size());
        self.write_to_log(&mut buf);
        buf
    }

    /// True for IN, BIN, DIN and DBIN.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::In(_) | Self::Bin(_) | Self::Din(_) | Self::Dbin(_))
    }

    /// Shared internal-node state, if this is an internal-like variant.
    #[must_use]
    pub const fn as_internal(&self) -> Option<&InternalBody> {
        match self {
            Self::In(n) => Some(n.body()),
            Self::Bin(n) => Some(n.body()),
            Self::Din(n) => Some(n.body()),
            Self::Dbin(n) => Some(n.body()),
            Self::Ln(_) | Self::DupCountLn(_) => None,
        }
    }

    pub const fn as_internal_mut(&mut self) -> Option<&mut InternalBody> {
        match self {
            Self::In(n) => Some(n.body_mut()),
            Self::Bin(n) => Some(n.body_mut()),
            Self::Din(n) => Some(n.body_mut()),
            Self::Dbin(n) => Some(n.body_mut()),
            Self::Ln(_) | Self::DupCountLn(_) => None,
        }
    }
}

impl TreeNode for Node {
    fn node_id(&self) -> NodeId {
        dispatch!(self, n => n.node_id())
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        dispatch!(self, n => n.set_node_id(id));
    }

    fn get_type(&self) -> &'static str {
        dispatch!(self, n => n.get_type())
    }

    fn level(&self) -> u32 {
        dispatch!(self, n => n.level())
    }

    fn contains_duplicates(&self) -> bool {
        dispatch!(self, n => n.contains_duplicates())
    }

    fn post_fetch_init(&mut self, db: DatabaseId, source_lsn: Lsn) {
        dispatch!(self, n => n.post_fetch_init(db, source_lsn));
    }

    fn match_ln_by_node_id(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        location: &mut TreeLocation,
        node_id: NodeId,
    ) -> Result<bool, NodeError> {
        dispatch!(self, n => n.match_ln_by_node_id(handle, arena, location, node_id))
    }

    fn is_sought_node(&mut self, node_id: NodeId, generations: Option<&GenerationClock>) -> bool {
        dispatch!(self, n => n.is_sought_node(node_id, generations))
    }

    fn can_be_ancestor(&self, target_contains_duplicates: bool) -> bool {
        dispatch!(self, n => n.can_be_ancestor(target_contains_duplicates))
    }

    fn is_valid_for_delete(&self, arena: &NodeArena) -> Result<bool, NodeError> {
        dispatch!(self, n => n.is_valid_for_delete(arena))
    }

    fn rebuild_in_list(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        dispatch!(self, n => n.rebuild_in_list(handle, arena, registry))
    }

    fn account_for_subtree_removal(
        &self,
        handle: NodeHandle,
        arena: &NodeArena,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        dispatch!(self, n => n.account_for_subtree_removal(handle, arena, registry, tracker))
    }

    fn memory_size_included_by_parent(&self) -> u64 {
        dispatch!(self, n => n.memory_size_included_by_parent())
    }

    fn dump_string(&self, n_spaces: usize, dump_tags: bool) -> String {
        dispatch!(self, n => n.dump_string(n_spaces, dump_tags))
    }

    fn short_description(&self) -> String {
        dispatch!(self, n => n.short_description())
    }
}

impl Loggable for Node {
    fn log_type(&self) -> LogEntryType {
        dispatch!(self, n => n.log_type())
    }

    fn log_size(&self) -> usize {
        dispatch!(self, n => n.log_size())
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        dispatch!(self, n => n.write_to_log(buf));
    }

    fn marshal_outside_write_latch(&self) -> bool {
        dispatch!(self, n => n.marshal_outside_write_latch())
    }

    fn counts_as_obsolete_when_logged(&self) -> bool {
        dispatch!(self, n => n.counts_as_obsolete_when_logged())
    }

    fn post_log_work(&mut self, lsn: Lsn) {
        dispatch!(self, n => n.post_log_work(lsn));
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        dispatch!(self, n => n.dump_log(out, verbose));
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump_string(0, true))
    }
}
