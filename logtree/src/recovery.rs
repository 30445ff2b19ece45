//! Node id recovery.
//!
//! Before a reopened environment creates any node, every node id present in
//! the log must be fed to the allocator so that none is issued twice. The
//! checkpointed high-water mark alone is not enough: nodes logged after the
//! last checkpoint carry ids above it.

use crate::log::{LogBuffer, LogError};
use crate::tree::{NodeId, NodeIdAllocator, TreeNode};

/// Result of replaying node ids.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of log entries scanned.
    pub entries_scanned: usize,
    /// Internal node entries among them.
    pub internal_nodes: usize,
    /// Leaf entries among them.
    pub leaf_nodes: usize,
    /// Highest node id found in the log (0 for an empty log).
    pub max_node_id: NodeId,
}

/// Raise the allocator's floor past every node id in `log`.
pub fn restore_node_ids(
    log: &LogBuffer,
    ids: &NodeIdAllocator,
) -> Result<RecoveryResult, LogError> {
    let mut result = RecoveryResult::default();
    for entry in log.entries()? {
        let node_id = entry.node.node_id();
        ids.observe_id(node_id);

        result.entries_scanned += 1;
        result.max_node_id = result.max_node_id.max(node_id);
        if entry.node.is_internal() {
            result.internal_nodes += 1;
        } else {
            result.leaf_nodes += 1;
        }
    }

    tracing::info!(
        entries = result.entries_scanned,
        max_node_id = result.max_node_id,
        floor = ids.current_id(),
        "restored node id floor"
    );
    Ok(result)
}
