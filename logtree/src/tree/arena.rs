//! Tree-owned node storage.
//!
//! Every resident node lives in a slot of the [`NodeArena`]. Parents, the
//! INList and search locations refer to children through [`NodeHandle`]s,
//! never through owning pointers, so there is no ownership cycle between the
//! tree and its registries.

use std::fmt;

use crate::tree::{Node, NodeError, ResidentNodeRegistry, TreeNode, UtilizationTracker};

/// Non-owning reference to a node slot in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot storage for resident nodes.
///
/// Freed slots are reused, so a handle is only meaningful while the node it
/// was issued for is still in the arena.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl NodeArena {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of resident nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a node and return its handle.
    pub fn insert(&mut self, node: Node) -> NodeHandle {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(node);
            NodeHandle(index)
        } else {
            self.slots.push(Some(node));
            NodeHandle(self.slots.len() - 1)
        }
    }

    pub fn get(&self, handle: NodeHandle) -> Result<&Node, NodeError> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(NodeError::DanglingHandle(handle))
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Result<&mut Node, NodeError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(NodeError::DanglingHandle(handle))
    }

    /// Remove a single node from the arena, leaving its children in place.
    pub fn take(&mut self, handle: NodeHandle) -> Result<Node, NodeError> {
        let node = self
            .slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(NodeError::DanglingHandle(handle))?;
        self.free.push(handle.0);
        Ok(node)
    }

    /// Point entry `index` of `parent` at the resident `child`.
    pub fn attach_child(
        &mut self,
        parent: NodeHandle,
        index: usize,
        child: NodeHandle,
    ) -> Result<(), NodeError> {
        self.get(child)?;
        let node = self.get_mut(parent)?;
        let node_type = node.get_type();
        node.as_internal_mut()
            .ok_or(NodeError::UnsupportedOperation {
                operation: "attach_child",
                node_type,
            })?
            .set_target(index, Some(child))
    }

    /// Handles of `root` and every resident node below it, parents first.
    pub fn subtree(&self, root: NodeHandle) -> Result<Vec<NodeHandle>, NodeError> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let node = self.get(handle)?;
            out.push(handle);
            if let Some(body) = node.as_internal() {
                stack.extend(body.entries().iter().rev().filter_map(|e| e.target));
            }
        }
        Ok(out)
    }

    /// Register every resident internal node under `root`.
    pub fn rebuild_in_list(
        &self,
        root: NodeHandle,
        registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        self.get(root)?.rebuild_in_list(root, self, registry)
    }

    /// Structurally remove the subtree rooted at `root`.
    ///
    /// The subtree is checked first: every handle must be resident and every
    /// internal node registered. On failure nothing has changed. Accounting
    /// then runs once per node, and every node of the subtree is dropped
    /// from the arena. Returns the number of nodes dropped.
    pub fn remove_subtree(
        &mut self,
        root: NodeHandle,
        registry: &mut dyn ResidentNodeRegistry,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<usize, NodeError> {
        let handles = self.subtree(root)?;
        for &handle in &handles {
            let node = self.get(handle)?;
            if node.is_internal() && !registry.contains(handle) {
                tracing::warn!(node_id = node.node_id(), %handle, "subtree removal refused");
                return Err(NodeError::StructuralContractViolation(format!(
                    "node {} at {handle} is not on the INList",
                    node.node_id()
                )));
            }
        }

        self.get(root)?
            .account_for_subtree_removal(root, self, registry, tracker)?;

        for handle in &handles {
            self.take(*handle)?;
        }
        tracing::debug!(%root, removed = handles.len(), "removed subtree");
        Ok(handles.len())
    }
}
