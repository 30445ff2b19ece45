//! In-memory node log.
//!
//! [`LogBuffer`] appends framed node records under a single write latch and
//! hands back the LSN of each entry. It honors the logging contract of the
//! nodes it writes:
//!
//! - nodes that allow it are marshalled before the latch is taken, the rest
//!   while it is held
//! - when a node counts as obsolete once logged, the version at the prior
//!   LSN is reported to the utilization tracker
//! - `post_log_work` runs after the append with the new LSN
//!
//! The whole log can be saved to and reopened from a file.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::log::codec::{LogError, LogReader};
use crate::log::entry::{LogEntryHeader, LogEntryType};
use crate::log::{Loggable, Lsn};
use crate::tree::{Node, ObsoleteNode, TreeNode, UtilizationTracker};

/// A node read back from the log.
#[derive(Debug)]
pub struct LoggedNode {
    pub lsn: Lsn,
    pub header: LogEntryHeader,
    pub node: Node,
}

/// Counters describing log activity since the buffer was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStats {
    /// Entries appended.
    pub entries: u64,
    /// Entries whose body was marshalled without holding the write latch.
    pub marshalled_outside_latch: u64,
    /// Total log length in bytes.
    pub bytes: u64,
}

/// Append-only log of node records.
#[derive(Debug, Default)]
pub struct LogBuffer {
    latch: Mutex<Vec<u8>>,
    entries: AtomicU64,
    marshalled_outside_latch: AtomicU64,
}

impl LogBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing log bytes, verifying every entry.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LogError> {
        let count = scan(&bytes)?.len() as u64;
        Ok(Self {
            latch: Mutex::new(bytes),
            entries: AtomicU64::new(count),
            marshalled_outside_latch: AtomicU64::new(0),
        })
    }

    /// Open a log saved with [`LogBuffer::save`].
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let log = Self::from_bytes(std::fs::read(path)?)?;
        tracing::info!(
            path = %path.display(),
            entries = log.entries.load(Ordering::Relaxed),
            "opened node log"
        );
        Ok(log)
    }

    /// Write the whole log to `path`.
    pub fn save(&self, path: &Path) -> Result<(), LogError> {
        let log = self.latch.lock().map_err(|_| LogError::LatchPoisoned)?;
        std::fs::write(path, log.as_slice())?;
        Ok(())
    }

    /// Log `node` and return the LSN it was written at.
    ///
    /// `prior_lsn` is the location of the node's previous version, if any.
    pub fn log_node(
        &self,
        node: &mut Node,
        prior_lsn: Option<Lsn>,
        tracker: &mut dyn UtilizationTracker,
    ) -> Result<Lsn, LogError> {
        let outside = node.marshal_outside_write_latch();
        let premarshalled = outside.then(|| node.marshal());

        let (lsn, obsolete_size) = {
            let mut log = self.latch.lock().map_err(|_| LogError::LatchPoisoned)?;
            let obsolete_size = match prior_lsn {
                Some(prior) if node.counts_as_obsolete_when_logged() => {
                    Some(entry_body_len(&log, prior)?)
                }
                _ => None,
            };
            let body = premarshalled.unwrap_or_else(|| node.marshal());
            let header = LogEntryHeader::for_body(node.log_type(), &body);
            let lsn = log.len() as Lsn;
            log.extend_from_slice(&header.to_bytes());
            log.extend_from_slice(&body);
            (lsn, obsolete_size)
        };

        self.entries.fetch_add(1, Ordering::Relaxed);
        if outside {
            self.marshalled_outside_latch.fetch_add(1, Ordering::Relaxed);
        }

        if let (Some(prior), Some(size)) = (prior_lsn, obsolete_size) {
            tracker.count_obsolete_node(ObsoleteNode {
                node_id: node.node_id(),
                log_type: node.log_type(),
                lsn: Some(prior),
                size,
            });
        }

        node.post_log_work(lsn);
        tracing::debug!(lsn, node = %node.short_description(), outside, "logged node");
        Ok(lsn)
    }

    /// Append a body that was marshalled elsewhere, at an explicit version.
    ///
    /// Used when carrying records over from an older log.
    pub fn append_record(
        &self,
        entry_type: LogEntryType,
        version: u8,
        body: &[u8],
    ) -> Result<Lsn, LogError> {
        entry_type.check_version(version)?;
        let mut header = LogEntryHeader::for_body(entry_type, body);
        header.version = version;

        let mut log = self.latch.lock().map_err(|_| LogError::LatchPoisoned)?;
        let lsn = log.len() as Lsn;
        log.extend_from_slice(&header.to_bytes());
        log.extend_from_slice(body);
        self.entries.fetch_add(1, Ordering::Relaxed);
        Ok(lsn)
    }

    /// Fault a node in from `lsn`.
    pub fn read_node(&self, lsn: Lsn) -> Result<Node, LogError> {
        let log = self.latch.lock().map_err(|_| LogError::LatchPoisoned)?;
        Ok(parse_entry(&log, lsn)?.0.node)
    }

    /// Every entry in log order.
    pub fn entries(&self) -> Result<Vec<LoggedNode>, LogError> {
        let log = self.latch.lock().map_err(|_| LogError::LatchPoisoned)?;
        scan(&log)
    }

    pub fn stats(&self) -> Result<LogStats, LogError> {
        let bytes = self
            .latch
            .lock()
            .map_err(|_| LogError::LatchPoisoned)?
            .len() as u64;
        Ok(LogStats {
            entries: self.entries.load(Ordering::Relaxed),
            marshalled_outside_latch: self.marshalled_outside_latch.load(Ordering::Relaxed),
            bytes,
        })
    }
}

fn scan(bytes: &[u8]) -> Result<Vec<LoggedNode>, LogError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (entry, next) = parse_entry(bytes, offset as Lsn)?;
        out.push(entry);
        offset = next;
    }
    Ok(out)
}

fn header_at(bytes: &[u8], lsn: Lsn) -> Result<(LogEntryHeader, usize), LogError> {
    let start = usize::try_from(lsn).map_err(|_| LogError::InvalidLsn(lsn))?;
    if start >= bytes.len() {
        return Err(LogError::InvalidLsn(lsn));
    }
    let header = LogEntryHeader::from_bytes(&bytes[start..])?;
    Ok((header, start + LogEntryHeader::SIZE))
}

fn entry_body_len(bytes: &[u8], lsn: Lsn) -> Result<usize, LogError> {
    Ok(header_at(bytes, lsn)?.0.body_len as usize)
}

/// Parse the entry at `lsn`, returning it and the offset of the next entry.
fn parse_entry(bytes: &[u8], lsn: Lsn) -> Result<(LoggedNode, usize), LogError> {
    let (header, body_start) = header_at(bytes, lsn)?;
    let body_end = body_start + header.body_len as usize;
    if body_end > bytes.len() {
        return Err(LogError::Truncated {
            needed: header.body_len as usize,
            remaining: bytes.len() - body_start,
        });
    }
    let body = &bytes[body_start..body_end];
    header.verify(body)?;

    let mut reader = LogReader::new(body);
    let node = Node::read_from_log(header.entry_type, &mut reader, header.version)?;
    if reader.remaining() != 0 {
        return Err(LogError::TrailingBytes(reader.remaining()));
    }
    Ok((LoggedNode { lsn, header, node }, body_end))
}
