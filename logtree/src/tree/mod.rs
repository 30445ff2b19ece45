//! B-tree node core.
//!
//! This module provides the node variants the tree is built from and the
//! contract tree algorithms rely on.
//!
//! # Structure
//!
//! - Internal nodes (IN, BIN, DIN, DBIN): keys plus child references, which
//!   are a logged LSN and, when resident, an arena handle
//! - Leaf nodes (LN, DupCountLN): record data and duplicate-set sizes
//! - [`NodeArena`]: the tree-owned slots every resident node lives in
//! - [`InList`] / [`ObsoleteTracker`]: bookkeeping fed by subtree rebuild
//!   and removal
//!
//! # Usage
//!
//! ```
//! use logtree::tree::{
//!     Bin, InList, Ln, Node, NodeArena, NodeIdAllocator, ObsoleteTracker, ResidentNodeRegistry,
//! };
//!
//! let ids = NodeIdAllocator::new();
//! let mut arena = NodeArena::new();
//!
//! let mut bin = Bin::new(&ids, b"a".to_vec(), 16).unwrap();
//! bin.body_mut().add_entry(b"a".to_vec(), 0).unwrap();
//! let bin = arena.insert(Node::Bin(bin));
//! let ln = arena.insert(Node::Ln(Ln::new(&ids, b"value".to_vec()).unwrap()));
//! arena.attach_child(bin, 0, ln).unwrap();
//!
//! let mut in_list = InList::new();
//! arena.rebuild_in_list(bin, &mut in_list).unwrap();
//! assert_eq!(in_list.len(), 1);
//!
//! let mut tracker = ObsoleteTracker::new();
//! arena.remove_subtree(bin, &mut in_list, &mut tracker).unwrap();
//! assert!(in_list.is_empty());
//! ```

mod arena;
mod internal;
mod leaf;
mod node;
mod node_id;
mod registry;
mod tracker;

#[cfg(test)]
mod tests;

pub use arena::{NodeArena, NodeHandle};
pub use internal::{
    BIN_LEVEL, Bin, ChildEntry, DBIN_LEVEL, DUPTREE_LEVEL, Dbin, Din, In, InternalBody,
    LEVEL_MASK, MAIN_LEVEL,
};
pub use leaf::{BYTE_ARRAY_OVERHEAD, DUP_COUNT_LN_OVERHEAD, DupCountLn, LN_OVERHEAD, Ln};
pub use node::{BEGIN_TAG, DatabaseId, END_TAG, Node, NodeError, TreeLocation, TreeNode};
pub use node_id::{GenerationClock, NodeId, NodeIdAllocator};
pub use registry::{InList, ResidentNodeRegistry};
pub use tracker::{ObsoleteNode, ObsoleteSummary, ObsoleteTracker, UtilizationTracker};
