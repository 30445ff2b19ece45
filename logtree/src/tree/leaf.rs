//! Leaf node variants: LN and DupCountLN.
//!
//! Leaves sit at level 0, are never on the INList and are charged to their
//! parent's memory budget. They cannot be ancestors of anything and are never
//! part of a deletable subtree: an LN may be deleted, but proving it without
//! a lock is the compressor's job, not the delete check's.
//!
//! # Record Format
//!
//! ```text
//! LN:         id (8) | data_len (4, signed, -1 = deleted) | data
//! DupCountLN: id (8) | data_len (4, always -1) | dup_count (4)
//! ```

use std::fmt::Write;

use crate::log::codec::{self, LogError, LogReader, NODE_ID_SIZE};
use crate::log::entry::{read_node_id, write_node_id};
use crate::log::{LogEntryType, LogReadable, Loggable};
use crate::tree::{
    NodeArena, NodeError, NodeHandle, NodeId, NodeIdAllocator, ResidentNodeRegistry, TreeNode,
    UtilizationTracker,
};

/// Fixed in-memory cost of a leaf.
pub const LN_OVERHEAD: u64 = 32;
/// Fixed in-memory cost of a byte array.
pub const BYTE_ARRAY_OVERHEAD: u64 = 16;
/// Fixed in-memory cost of a duplicate count leaf.
pub const DUP_COUNT_LN_OVERHEAD: u64 = LN_OVERHEAD + 8;

/// `data_len` written for a leaf without data.
const DELETED_DATA_LEN: i32 = -1;

/// Data lengths are logged as a signed 32-bit value.
fn check_data_len(len: usize) -> Result<(), NodeError> {
    if i32::try_from(len).is_err() {
        return Err(NodeError::DataTooLarge(len));
    }
    Ok(())
}

/// Leaf node holding one record's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ln {
    id: NodeId,
    data: Option<Vec<u8>>,
}

impl Ln {
    /// Create a leaf holding `data` with a fresh node id.
    pub fn new(ids: &NodeIdAllocator, data: Vec<u8>) -> Result<Self, NodeError> {
        check_data_len(data.len())?;
        Ok(Self::with_id(ids.next_id(), Some(data)))
    }

    pub(crate) const fn with_id(id: NodeId, data: Option<Vec<u8>>) -> Self {
        Self { id, data }
    }

    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.data.is_none()
    }

    pub fn set_data(&mut self, data: Vec<u8>) -> Result<(), NodeError> {
        check_data_len(data.len())?;
        self.data = Some(data);
        Ok(())
    }

    /// Mark deleted, dropping the data.
    pub fn delete(&mut self) {
        self.data = None;
    }

    fn data_log_size(&self) -> usize {
        4 + self.data.as_ref().map_or(0, Vec::len)
    }

    #[allow(clippy::cast_possible_truncation)] // data.len() <= i32::MAX, checked when data is set
    fn write_data(&self, buf: &mut Vec<u8>) {
        match &self.data {
            Some(data) => {
                codec::write_i32(buf, data.len() as i32);
                buf.extend_from_slice(data);
            }
            None => codec::write_i32(buf, DELETED_DATA_LEN),
        }
    }

    fn read_data(reader: &mut LogReader<'_>) -> Result<Option<Vec<u8>>, LogError> {
        match reader.read_i32()? {
            DELETED_DATA_LEN => Ok(None),
            len if len < 0 => Err(LogError::InvalidField("data_len")),
            #[allow(clippy::cast_sign_loss)]
            len => Ok(Some(reader.read_slice(len as usize)?.to_vec())),
        }
    }
}

impl TreeNode for Ln {
    fn node_id(&self) -> NodeId {
        self.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.id = id;
    }

    fn get_type(&self) -> &'static str {
        "LN"
    }

    fn can_be_ancestor(&self, _target_contains_duplicates: bool) -> bool {
        false
    }

    fn is_valid_for_delete(&self, _arena: &NodeArena) -> Result<bool, NodeError> {
        Ok(false)
    }

    fn rebuild_in_list(
        &self,
        _handle: NodeHandle,
        _arena: &NodeArena,
        _registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    // Leaf log space is counted when the deletion itself is logged.
    fn account_for_subtree_removal(
        &self,
        _handle: NodeHandle,
        _arena: &NodeArena,
        _registry: &mut dyn ResidentNodeRegistry,
        _tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    fn memory_size_included_by_parent(&self) -> u64 {
        LN_OVERHEAD
            + self
                .data
                .as_ref()
                .map_or(0, |d| BYTE_ARRAY_OVERHEAD + d.len() as u64)
    }
}

impl Loggable for Ln {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::Ln
    }

    fn log_size(&self) -> usize {
        NODE_ID_SIZE + self.data_log_size()
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        write_node_id(buf, self.id);
        self.write_data(buf);
    }

    // The owning cursor may still be rewriting data while the entry is queued.
    fn marshal_outside_write_latch(&self) -> bool {
        false
    }

    /// Logging a deletion leaves nothing that refers to the old version.
    fn counts_as_obsolete_when_logged(&self) -> bool {
        self.is_deleted()
    }

    fn dump_log(&self, out: &mut String, verbose: bool) {
        let _ = write!(out, "<ln><node>{}</node>", self.id);
        match &self.data {
            Some(data) if verbose => {
                let _ = write!(out, "<data>{}</data>", codec::hex(data));
            }
            Some(data) => {
                let _ = write!(out, "<data len=\"{}\"/>", data.len());
            }
            None => out.push_str("<deleted/>"),
        }
        out.push_str("</ln>");
    }
}

impl LogReadable for Ln {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        LogEntryType::Ln.check_version(version)?;
        let id = read_node_id(reader)?;
        let data = Self::read_data(reader)?;
        Ok(Self { id, data })
    }
}

/// Leaf recording how many records a duplicate subtree holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DupCountLn {
    id: NodeId,
    dup_count: u32,
}

impl DupCountLn {
    #[must_use]
    pub fn new(ids: &NodeIdAllocator, dup_count: u32) -> Self {
        Self::with_id(ids.next_id(), dup_count)
    }

    pub(crate) const fn with_id(id: NodeId, dup_count: u32) -> Self {
        Self { id, dup_count }
    }

    #[must_use]
    pub const fn dup_count(&self) -> u32 {
        self.dup_count
    }

    pub const fn increment(&mut self) -> u32 {
        self.dup_count = self.dup_count.saturating_add(1);
        self.dup_count
    }

    pub const fn decrement(&mut self) -> u32 {
        self.dup_count = self.dup_count.saturating_sub(1);
        self.dup_count
    }
}

impl TreeNode for DupCountLn {
    fn node_id(&self) -> NodeId {
        self.id
    }

    #[cfg(test)]
    fn set_node_id(&mut self, id: NodeId) {
        self.id = id;
    }

    fn get_type(&self) -> &'static str {
        "DupCountLN"
    }

    fn can_be_ancestor(&self, _target_contains_duplicates: bool) -> bool {
        false
    }

    fn is_valid_for_delete(&self, _arena: &NodeArena) -> Result<bool, NodeError> {
        Ok(false)
    }

    fn rebuild_in_list(
        &self,
        _handle: NodeHandle,
        _arena: &NodeArena,
        _registry: &mut dyn ResidentNodeRegistry,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    fn account_for_subtree_removal(
        &self,
        _handle: NodeHandle,
        _arena: &NodeArena,
        _registry: &mut dyn ResidentNodeRegistry,
        _tracker: &mut dyn UtilizationTracker,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    fn memory_size_included_by_parent(&self) -> u64 {
        DUP_COUNT_LN_OVERHEAD
    }
}

impl Loggable for DupCountLn {
    fn log_type(&self) -> LogEntryType {
        LogEntryType::DupCountLn
    }

    fn log_size(&self) -> usize {
        NODE_ID_SIZE + 4 + 4
    }

    fn write_to_log(&self, buf: &mut Vec<u8>) {
        write_node_id(buf, self.id);
        codec::write_i32(buf, DELETED_DATA_LEN);
        codec::write_u32(buf, self.dup_count);
    }

    fn marshal_outside_write_latch(&self) -> bool {
        false
    }

    /// Every new count supersedes the previously logged one.
    fn counts_as_obsolete_when_logged(&self) -> bool {
        true
    }

    fn dump_log(&self, out: &mut String, _verbose: bool) {
        let _ = write!(
            out,
            "<dupCountLN><count v=\"{}\"/><node>{}</node></dupCountLN>",
            self.dup_count, self.id
        );
    }
}

impl LogReadable for DupCountLn {
    fn read_from_log(reader: &mut LogReader<'_>, version: u8) -> Result<Self, LogError> {
        LogEntryType::DupCountLn.check_version(version)?;
        let id = read_node_id(reader)?;
        if reader.read_i32()? != DELETED_DATA_LEN {
            return Err(LogError::InvalidField("data_len"));
        }
        let dup_count = reader.read_u32()?;
        Ok(Self { id, dup_count })
    }
}
