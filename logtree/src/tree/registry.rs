//! Registry of memory-resident internal nodes (the INList).
//!
//! The registry never owns nodes. It holds [`NodeHandle`]s into the
//! [`NodeArena`](crate::tree::NodeArena) the tree owns, which is what lets the
//! evictor and cleaner scan resident internal nodes without a reference cycle.
//! Only internal-like variants are ever added.

use std::collections::BTreeMap;

use crate::tree::{NodeHandle, NodeId};

/// Collaborator interface consumed by `rebuild_in_list` and
/// `account_for_subtree_removal`.
pub trait ResidentNodeRegistry {
    /// Register a resident internal node.
    fn add(&mut self, handle: NodeHandle, node_id: NodeId);

    /// Deregister a node. Returns false if it was not registered.
    fn remove(&mut self, handle: NodeHandle) -> bool;

    fn contains(&self, handle: NodeHandle) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory INList keyed by arena handle.
#[derive(Debug, Default)]
pub struct InList {
    nodes: BTreeMap<NodeHandle, NodeId>,
    adds: u64,
    removes: u64,
}

impl InList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            adds: 0,
            removes: 0,
        }
    }

    /// Node id registered under `handle`, if any.
    #[must_use]
    pub fn node_id(&self, handle: NodeHandle) -> Option<NodeId> {
        self.nodes.get(&handle).copied()
    }

    /// Registered handles in ascending order.
    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.nodes.keys().copied()
    }

    /// Total successful `add` calls, including re-registrations.
    #[must_use]
    pub const fn add_count(&self) -> u64 {
        self.adds
    }

    /// Total successful `remove` calls.
    #[must_use]
    pub const fn remove_count(&self) -> u64 {
        self.removes
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl ResidentNodeRegistry for InList {
    fn add(&mut self, handle: NodeHandle, node_id: NodeId) {
        self.adds += 1;
        if let Some(previous) = self.nodes.insert(handle, node_id) {
            if previous != node_id {
                tracing::warn!(%handle, previous, node_id, "INList slot reused without removal");
            }
        }
    }

    fn remove(&mut self, handle: NodeHandle) -> bool {
        let removed = self.nodes.remove(&handle).is_some();
        if removed {
            self.removes += 1;
        }
        removed
    }

    fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}
