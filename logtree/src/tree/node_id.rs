//! Node identity allocation.
//!
//! Node ids name a node independently of where it lives in the log. They are
//! handed out by a [`NodeIdAllocator`] owned by the environment, so two
//! environments in one process never share a counter.
//!
//! # Guarantees
//!
//! - Ids returned by `next_id` are strictly increasing and never repeat while
//!   the allocator lives
//! - The high-water mark never decreases
//! - After recovery has called `observe_id` for every id in the log, no new
//!   node can collide with a logged one

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of a tree node.
pub type NodeId = u64;

/// Monotonic node id source.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    last_allocated: AtomicU64,
}

impl NodeIdAllocator {
    /// Create an allocator for a brand new environment. The first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_floor(0)
    }

    /// Create an allocator restored from a checkpointed high-water mark.
    #[must_use]
    pub const fn with_floor(last_allocated: NodeId) -> Self {
        Self {
            last_allocated: AtomicU64::new(last_allocated),
        }
    }

    /// Increment and return the next usable id.
    pub fn next_id(&self) -> NodeId {
        self.last_allocated.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Raise the floor to at least `id`.
    ///
    /// Recovery calls this for every id it replays so those ids are never
    /// issued again. Lower values are ignored.
    pub fn observe_id(&self, id: NodeId) {
        let previous = self.last_allocated.fetch_max(id, Ordering::SeqCst);
        if previous < id {
            tracing::trace!(previous, floor = id, "raised node id floor");
        }
    }

    /// The latest id handed out or observed, for checkpointing.
    #[must_use]
    pub fn current_id(&self) -> NodeId {
        self.last_allocated.load(Ordering::SeqCst)
    }
}

/// Source of cache-recency stamps for internal nodes.
///
/// A search that touches an internal node may stamp it with the next
/// generation; eviction prefers nodes with the oldest stamp.
#[derive(Debug, Default)]
pub struct GenerationClock {
    last: AtomicU64,
}

impl GenerationClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Return the next generation.
    pub fn next_generation(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
