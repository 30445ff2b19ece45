//! Big-endian field codec for log record bodies.
//!
//! Every multi-byte integer in a node record is stored big-endian. Byte
//! strings (keys, identifier keys) are prefixed with a `u16` length.

use crate::log::entry::LogEntryType;
use crate::log::Lsn;

/// Size of a serialized node id.
pub const NODE_ID_SIZE: usize = 8;

/// Size of the `u16` length prefix in front of a byte string.
pub const BYTES_PREFIX_SIZE: usize = 2;

/// Errors raised while decoding or framing log records.
#[derive(Debug)]
pub enum LogError {
    /// The record was written with a format version this build cannot read.
    UnsupportedVersion {
        /// Entry type being read.
        entry_type: LogEntryType,
        /// Version byte found in the entry header.
        version: u8,
    },
    /// The entry header carries a type byte no node variant uses.
    UnknownEntryType(u8),
    /// The buffer ended before a field could be read.
    Truncated {
        /// Bytes the field needed.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
    /// The body decoded cleanly but bytes were left over.
    TrailingBytes(usize),
    /// A field held a value no writer produces.
    InvalidField(&'static str),
    /// Body checksum does not match the header.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// No entry starts at this LSN.
    InvalidLsn(Lsn),
    /// The log write latch was poisoned by a panicking writer.
    LatchPoisoned,
    /// Reading or writing the log file failed.
    Io(std::io::Error),
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion {
                entry_type,
                version,
            } => write!(f, "unsupported log version {version} for {entry_type:?} entry"),
            Self::UnknownEntryType(t) => write!(f, "unknown log entry type: {t:#04x}"),
            Self::Truncated { needed, remaining } => {
                write!(f, "log record truncated: needed {needed} bytes, {remaining} remaining")
            }
            Self::TrailingBytes(n) => write!(f, "{n} unread bytes after log record body"),
            Self::InvalidField(field) => write!(f, "invalid value for log field {field}"),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "log checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
            ),
            Self::InvalidLsn(lsn) => write!(f, "no log entry at lsn {lsn}"),
            Self::LatchPoisoned => write!(f, "log write latch poisoned"),
            Self::Io(e) => write!(f, "log i/o error: {e}"),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Cursor over a record body.
#[derive(Debug)]
pub struct LogReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> LogReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Take the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], LogError> {
        if self.remaining() < len {
            return Err(LogError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], LogError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, LogError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, LogError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(LogError::InvalidField("bool")),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, LogError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, LogError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, LogError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, LogError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read a `u16`-length-prefixed byte string.
    pub fn read_prefixed_bytes(&mut self) -> Result<Vec<u8>, LogError> {
        let len = usize::from(self.read_u16()?);
        Ok(self.read_slice(len)?.to_vec())
    }
}

pub fn write_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Write a `u16`-length-prefixed byte string.
///
/// Callers keep byte strings under `u16::MAX`; node constructors enforce it.
#[allow(clippy::cast_possible_truncation)]
pub fn write_prefixed_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_u16(buf, bytes.len() as u16);
    buf.extend_from_slice(bytes);
}

/// Serialized size of a prefixed byte string.
#[must_use]
pub const fn prefixed_bytes_size(bytes: &[u8]) -> usize {
    BYTES_PREFIX_SIZE + bytes.len()
}

/// Lowercase hex rendering used by the log dumpers.
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
