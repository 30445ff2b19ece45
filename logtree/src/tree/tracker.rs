//! Obsolete log space tracking.
//!
//! When a subtree is removed, or a node is logged in a way that supersedes
//! its previous version, the log space of the old version becomes garbage.
//! The tracker accumulates that information for the log cleaner.

use std::collections::{BTreeMap, VecDeque};

use crate::log::{LogEntryType, Lsn};
use crate::tree::NodeId;

/// One node version that is no longer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObsoleteNode {
    pub node_id: NodeId,
    pub log_type: LogEntryType,
    /// Location of the obsolete version, if the node was ever logged.
    pub lsn: Option<Lsn>,
    /// Size of the obsolete record body.
    pub size: usize,
}

/// Collaborator interface notified of obsolete node versions.
pub trait UtilizationTracker {
    fn count_obsolete_node(&mut self, obsolete: ObsoleteNode);
}

/// Per-entry-type totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObsoleteSummary {
    /// Notifications received.
    pub nodes: u64,
    /// Bytes of logged versions made obsolete.
    pub bytes: u64,
}

/// In-memory tracker summarizing obsolete space by entry type.
///
/// Nodes that were never logged are counted but contribute no bytes. Only
/// the last [`ObsoleteTracker::RECENT_CAPACITY`] notifications are kept for
/// `take_recent`; the totals cover everything.
#[derive(Debug, Default)]
pub struct ObsoleteTracker {
    by_type: BTreeMap<LogEntryType, ObsoleteSummary>,
    recent: VecDeque<ObsoleteNode>,
}

impl ObsoleteTracker {
    /// Notifications retained between calls to `take_recent`.
    pub const RECENT_CAPACITY: usize = 1024;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_type: BTreeMap::new(),
            recent: VecDeque::new(),
        }
    }

    /// Total notifications across all types.
    #[must_use]
    pub fn obsolete_nodes(&self) -> u64 {
        self.by_type.values().map(|s| s.nodes).sum()
    }

    /// Total obsolete bytes across all types.
    #[must_use]
    pub fn obsolete_bytes(&self) -> u64 {
        self.by_type.values().map(|s| s.bytes).sum()
    }

    #[must_use]
    pub fn summary(&self, log_type: LogEntryType) -> ObsoleteSummary {
        self.by_type.get(&log_type).copied().unwrap_or_default()
    }

    /// Notifications since the last `take_recent`, oldest first.
    pub fn take_recent(&mut self) -> Vec<ObsoleteNode> {
        self.recent.drain(..).collect()
    }
}

impl UtilizationTracker for ObsoleteTracker {
    fn count_obsolete_node(&mut self, obsolete: ObsoleteNode) {
        let summary = self.by_type.entry(obsolete.log_type).or_default();
        summary.nodes += 1;
        if obsolete.lsn.is_some() {
            summary.bytes += obsolete.size as u64;
        }
        if self.recent.len() == Self::RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(obsolete);
    }
}
