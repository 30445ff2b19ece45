//! Durable log support for tree nodes.
//!
//! Nodes are written as framed entries: a small header carrying the entry
//! type, format version and body checksum, followed by the body produced by
//! [`Loggable::write_to_log`]. The position of an entry's header is its LSN.
//!
//! # Usage
//!
//! ```
//! use logtree::log::LogBuffer;
//! use logtree::tree::{Ln, Node, NodeIdAllocator, ObsoleteTracker};
//!
//! let ids = NodeIdAllocator::new();
//! let log = LogBuffer::new();
//! let mut tracker = ObsoleteTracker::new();
//!
//! let mut node = Node::Ln(Ln::new(&ids, b"value".to_vec()).unwrap());
//! let lsn = log.log_node(&mut node, None, &mut tracker).unwrap();
//! let restored = log.read_node(lsn).unwrap();
//! assert_eq!(restored.to_string(), node.to_string());
//! ```

mod buffer;
pub mod codec;
pub mod entry;

pub use buffer::{LogBuffer, LogStats, LoggedNode};
pub use codec::{LogError, LogReader};
pub use entry::{LOG_VERSION, LogEntryHeader, LogEntryType, LogReadable, Loggable, MIN_LOG_VERSION};

/// Log Sequence Number: byte offset of an entry's header in the log.
pub type Lsn = u64;

/// Sentinel stored where a logged LSN field is empty.
pub const NULL_LSN: Lsn = u64::MAX;
