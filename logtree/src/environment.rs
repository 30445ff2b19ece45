//! Storage environment owning node identity.
//!
//! An [`Environment`] is the unit that owns the node id allocator and the
//! generation clock, so several environments can live in one process without
//! sharing counters.
//!
//! # Lifecycle
//!
//! 1. `open` for a fresh environment, or `recover` to restore the id floor
//!    from the last checkpoint and the log
//! 2. Create nodes through the `new_*` constructors, fault them in through
//!    `fetch_node`
//! 3. `checkpoint` to capture the id high-water mark for the next startup

use crate::config::EngineConfig;
use crate::log::{LogBuffer, LogError, Lsn};
use crate::recovery::{RecoveryResult, restore_node_ids};
use crate::tree::{
    Bin, DatabaseId, Dbin, Din, DupCountLn, GenerationClock, In, Ln, Node, NodeError, NodeId,
    NodeIdAllocator, TreeNode,
};

/// State persisted at checkpoint time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Node id high-water mark when the checkpoint was taken.
    pub last_node_id: NodeId,
}

/// A storage environment.
#[derive(Debug)]
pub struct Environment {
    config: EngineConfig,
    node_ids: NodeIdAllocator,
    generations: GenerationClock,
}

impl Environment {
    /// Open a brand new environment. Node ids start at 1.
    #[must_use]
    pub fn open(config: EngineConfig) -> Self {
        tracing::info!(
            node_max_entries = config.node_max_entries,
            dup_node_max_entries = config.dup_node_max_entries,
            "opened environment"
        );
        Self {
            config,
            node_ids: NodeIdAllocator::new(),
            generations: GenerationClock::new(),
        }
    }

    /// Reopen an environment, restoring the id floor from the last
    /// checkpoint and then from every node in the log.
    pub fn recover(
        config: EngineConfig,
        checkpoint: Option<Checkpoint>,
        log: &LogBuffer,
    ) -> Result<(Self, RecoveryResult), LogError> {
        let floor = checkpoint.map_or(0, |c| c.last_node_id);
        let node_ids = NodeIdAllocator::with_floor(floor);
        let result = restore_node_ids(log, &node_ids)?;
        tracing::info!(
            checkpoint_floor = floor,
            node_id = node_ids.current_id(),
            "recovered environment"
        );
        Ok((
            Self {
                config,
                node_ids,
                generations: GenerationClock::new(),
            },
            result,
        ))
    }

    /// Capture the state the next `recover` needs.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        let checkpoint = Checkpoint {
            last_node_id: self.node_ids.current_id(),
        };
        tracing::debug!(last_node_id = checkpoint.last_node_id, "checkpoint");
        checkpoint
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn node_ids(&self) -> &NodeIdAllocator {
        &self.node_ids
    }

    #[must_use]
    pub const fn generations(&self) -> &GenerationClock {
        &self.generations
    }

    pub fn new_in(&self, depth: u32, identifier_key: Vec<u8>) -> Result<In, NodeError> {
        In::new(
            &self.node_ids,
            depth,
            identifier_key,
            self.config.node_max_entries,
        )
    }

    pub fn new_bin(&self, identifier_key: Vec<u8>) -> Result<Bin, NodeError> {
        Bin::new(&self.node_ids, identifier_key, self.config.node_max_entries)
    }

    pub fn new_din(
        &self,
        depth: u32,
        identifier_key: Vec<u8>,
        dup_count_lsn: Option<Lsn>,
    ) -> Result<Din, NodeError> {
        Din::new(
            &self.node_ids,
            depth,
            identifier_key,
            self.config.dup_node_max_entries,
            dup_count_lsn,
        )
    }

    pub fn new_dbin(&self, identifier_key: Vec<u8>) -> Result<Dbin, NodeError> {
        Dbin::new(
            &self.node_ids,
            identifier_key,
            self.config.dup_node_max_entries,
        )
    }

    pub fn new_ln(&self, data: Vec<u8>) -> Result<Ln, NodeError> {
        Ln::new(&self.node_ids, data)
    }

    #[must_use]
    pub fn new_dup_count_ln(&self, dup_count: u32) -> DupCountLn {
        DupCountLn::new(&self.node_ids, dup_count)
    }

    /// Fault in the node logged at `lsn` and run its post-fetch initialization.
    pub fn fetch_node(&self, log: &LogBuffer, db: DatabaseId, lsn: Lsn) -> Result<Node, LogError> {
        let mut node = log.read_node(lsn)?;
        node.post_fetch_init(db, lsn);
        Ok(node)
    }
}
