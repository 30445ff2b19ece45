//! Log entry types, entry framing and the node logging contract.
//!
//! # Entry Format
//!
//! Each entry in the log has the following layout:
//! ```text
//! +----------+----------------------------------------------+
//! | 0        | entry_type (1 byte)                          |
//! | 1        | version (1 byte)                             |
//! | 2-5      | body_length (4 bytes, big-endian)            |
//! | 6-9      | CRC32 of the body (4 bytes, big-endian)      |
//! | 10-N     | body (node record, written by `Loggable`)    |
//! +----------+----------------------------------------------+
//! ```
//!
//! The node record body always starts with the 8-byte node id.

use std::fmt::Write;

use crate::log::Lsn;
use crate::log::codec::{self, LogError, LogReader, NODE_ID_SIZE};
use crate::tree::{BEGIN_TAG, END_TAG, NodeId, TreeNode};

/// Format version written by this build.
pub const LOG_VERSION: u8 = 2;

/// Oldest format version this build can still read.
///
/// Version 1 internal-node records carry no per-entry known-deleted flag.
pub const MIN_LOG_VERSION: u8 = 1;

/// Stable identifier of the record family for each node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogEntryType {
    /// Main-tree internal node.
    In = 0x01,
    /// Main-tree bottom internal node.
    Bin = 0x02,
    /// Duplicate-tree internal node.
    Din = 0x03,
    /// Duplicate-tree bottom internal node.
    Dbin = 0x04,
    /// Leaf node holding a record's data.
    Ln = 0x05,
    /// Leaf node holding the size of a duplicate set.
    DupCountLn = 0x06,
}

impl TryFrom<u8> for LogEntryType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::In),
            0x02 => Ok(Self::Bin),
            0x03 => Ok(Self::Din),
            0x04 => Ok(Self::Dbin),
            0x05 => Ok(Self::Ln),
            0x06 => Ok(Self::DupCountLn),
            _ => Err(value),
        }
    }
}

impl LogEntryType {
    /// Fail with `UnsupportedVersion` unless `version` is readable.
    pub fn check_version(self, version: u8) -> Result<(), LogError> {
        if (MIN_LOG_VERSION..=LOG_VERSION).contains(&version) {
            Ok(())
        } else {
            Err(LogError::UnsupportedVersion {
                entry_type: self,
                version,
            })
        }
    }

    /// True for the internal-node record families.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::In | Self::Bin | Self::Din | Self::Dbin)
    }
}

/// Header framing a node record in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntryHeader {
    pub entry_type: LogEntryType,
    pub version: u8,
    pub body_len: u32,
    pub checksum: u32,
}

impl LogEntryHeader {
    /// Serialized header size.
    pub const SIZE: usize = 10;

    /// Build the header for a freshly marshalled body.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // node records are far below 4GB
    pub fn for_body(entry_type: LogEntryType, body: &[u8]) -> Self {
        Self {
            entry_type,
            version: LOG_VERSION,
            body_len: body.len() as u32,
            checksum: crc32fast::hash(body),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.entry_type as u8;
        bytes[1] = self.version;
        bytes[2..6].copy_from_slice(&self.body_len.to_be_bytes());
        bytes[6..10].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Parse a header, rejecting unknown types and unreadable versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogError> {
        let mut reader = LogReader::new(bytes);
        let raw_type = reader.read_u8()?;
        let entry_type = LogEntryType::try_from(raw_type).map_err(LogError::UnknownEntryType)?;
        let version = reader.read_u8()?;
        entry_type.check_version(version)?;
        let body_len = reader.read_u32()?;
        let checksum = reader.read_u32()?;
        Ok(Self {
            entry_type,
            version,
            body_len,
            checksum,
        })
    }

    /// Verify the body against the stored checksum.
    pub fn verify(&self, body: &[u8]) -> Result<(), LogError> {
        let actual = crc32fast::hash(body);
        if actual == self.checksum {
            Ok(())
        } else {
            Err(LogError::ChecksumMismatch {
                expected: self.checksum,
                actual,
            })
        }
    }
}

/// The write half of the log record contract.
///
/// The defaults describe a node whose only logged field is its id.
pub trait Loggable: TreeNode {
    /// Record family written for this node.
    fn log_type(&self) -> LogEntryType;

    /// Exact number of bytes `write_to_log` appends.
    ///
    /// Variants add their own fields to the 8-byte id contribution.
    fn log_size(&self) -> usize {
        NODE_ID_SIZE
    }

    /// Append the record body: the id, then variant fields in a fixed order.
    fn write_to_log(&self, buf: &mut Vec<u8>) {
        write_node_id(buf, self.node_id());
    }

    /// Whether the node may be marshalled without holding the log write latch.
    ///
    /// True promises that the node's content cannot change between marshal
    /// and append. Variants whose fields may still mutate while the log is
    /// being written must return false.
    fn marshal_outside_write_latch(&self) -> bool {
        true
    }

    /// Whether logging this node makes its prior logged version obsolete.
    fn counts_as_obsolete_when_logged(&self) -> bool {
        false
    }

    /// Called once the record has been appended at `lsn`.
    fn post_log_work(&mut self, _lsn: Lsn) {}

    /// Render the record for log printing.
    fn dump_log(&self, out: &mut String, _verbose: bool) {
        let _ = write!(out, "{BEGIN_TAG}{}{END_TAG}", self.node_id());
    }
}

/// The read half of the log record contract.
pub trait LogReadable: Sized {
    /// Rebuild a node from a body written at format `version`.
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError>;
}

pub fn write_node_id(buf: &mut Vec<u8>, id: NodeId) {
    codec::write_u64(buf, id);
}

pub fn read_node_id(reader: &mut LogReader<'_>) -> Result<NodeId, LogError> {
    reader.read_u64()
}
