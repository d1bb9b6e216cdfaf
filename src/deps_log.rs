//! `.ninja_deps` encoding.
//!
//! Ninja stores implicit dependencies in a binary log: a signature and
//! version, then a stream of length-prefixed records. Path records assign
//! sequential ids to paths; dependency records refer to those ids. Ninja
//! verifies every path record's checksum (`!id`) against the id it expects
//! next, so ids are handed out in first-seen order and written in that
//! order.
//!
//! # Examples
//!
//! ```
//! use kninja::deps_log::{decode, encode};
//! use kninja::graph::DependencyRecord;
//!
//! let records = vec![DependencyRecord {
//!     target: "init/main.o".into(),
//!     mtime: 1_700_000_000_123_456_789,
//!     deps: vec!["init/main.c".into(), "include/linux/init.h".into()],
//! }];
//! let bytes = encode(&records).expect("encode");
//! assert_eq!(decode(&bytes).expect("decode").records, records);
//! ```

use crate::graph::DependencyRecord;
use indexmap::IndexSet;
use miette::Diagnostic;
use std::io::{self, Write};
use thiserror::Error;

/// File signature.
pub const SIGNATURE: &[u8] = b"# ninjadeps\n";
/// Format version.
pub const VERSION: i32 = 4;

/// High bit of a record header marks a dependency record.
const DEPS_RECORD_FLAG: u32 = 1 << 31;
/// Largest record body Ninja accepts.
const MAX_RECORD_SIZE: u32 = (1 << 19) - 1;

/// Errors raised while encoding or decoding a deps log.
#[derive(Debug, Error, Diagnostic)]
pub enum DepsLogError {
    /// Writing the log failed.
    #[error("failed to write deps log")]
    #[diagnostic(code(kninja::deps_log::io))]
    Io(#[from] io::Error),
    /// More distinct paths than a signed 32-bit id can address.
    #[error("too many distinct paths for the deps log ({count})")]
    #[diagnostic(code(kninja::deps_log::too_many_paths))]
    TooManyPaths {
        /// Number of paths encountered.
        count: usize,
    },
    /// A single record would exceed Ninja's record size limit.
    #[error("deps log record for {path} is too large ({size} bytes)")]
    #[diagnostic(code(kninja::deps_log::record_too_large))]
    RecordTooLarge {
        /// Path or target the record describes.
        path: String,
        /// Size of the record body.
        size: usize,
    },
    /// The input does not start with the deps log signature.
    #[error("missing deps log signature")]
    #[diagnostic(code(kninja::deps_log::bad_signature))]
    BadSignature,
    /// The input uses a different format version.
    #[error("unsupported deps log version {0}")]
    #[diagnostic(code(kninja::deps_log::unsupported_version))]
    UnsupportedVersion(i32),
    /// The input ends in the middle of a record.
    #[error("deps log truncated at offset {offset}")]
    #[diagnostic(code(kninja::deps_log::truncated))]
    Truncated {
        /// Byte offset where more data was expected.
        offset: usize,
    },
    /// A path record's checksum does not match its position.
    #[error("deps log path record {expected} has checksum for id {found}")]
    #[diagnostic(code(kninja::deps_log::bad_checksum))]
    BadChecksum {
        /// Id the record should carry.
        expected: usize,
        /// Id encoded in the checksum.
        found: i64,
    },
    /// A dependency record refers to a path id never declared.
    #[error("deps log refers to unknown path id {0}")]
    #[diagnostic(code(kninja::deps_log::unknown_id))]
    UnknownId(i64),
    /// A path record is not valid UTF-8.
    #[error("deps log path is not valid UTF-8")]
    #[diagnostic(code(kninja::deps_log::invalid_path))]
    InvalidPath(#[from] std::string::FromUtf8Error),
}

/// Paths of a set of records, numbered in first-seen order.
#[derive(Debug, Default)]
pub struct PathTable<'a> {
    paths: IndexSet<&'a str>,
}

impl<'a> PathTable<'a> {
    /// Number every target and dependency path in `records`.
    #[must_use]
    pub fn new(records: &'a [DependencyRecord]) -> Self {
        let mut paths = IndexSet::new();
        for record in records {
            paths.insert(record.target.as_str());
            paths.extend(record.deps.iter().map(String::as_str));
        }
        Self { paths }
    }

    /// Id assigned to `path`, if present.
    #[must_use]
    pub fn id(&self, path: &str) -> Option<usize> {
        self.paths.get_index_of(path)
    }

    /// Paths in id order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.paths.iter().copied()
    }

    /// Number of distinct paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Return `true` when no paths were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Encode `records` into an in-memory deps log.
///
/// # Errors
///
/// See [`write_deps`].
pub fn encode(records: &[DependencyRecord]) -> Result<Vec<u8>, DepsLogError> {
    let mut out = Vec::new();
    write_deps(&mut out, records)?;
    Ok(out)
}

/// Write `records` as a deps log to `out`.
///
/// # Errors
///
/// Returns [`DepsLogError::Io`] when writing fails,
/// [`DepsLogError::TooManyPaths`] when ids would overflow, and
/// [`DepsLogError::RecordTooLarge`] when a record exceeds Ninja's limit.
pub fn write_deps<W: Write>(out: &mut W, records: &[DependencyRecord]) -> Result<(), DepsLogError> {
    let table = PathTable::new(records);
    if i32::try_from(table.len()).is_err() {
        return Err(DepsLogError::TooManyPaths { count: table.len() });
    }

    out.write_all(SIGNATURE)?;
    write_i32(out, VERSION)?;

    for (id, path) in table.iter().enumerate() {
        let bytes = path.as_bytes();
        let padded = bytes.len().next_multiple_of(4);
        write_u32(out, record_size(path, padded + 4)?)?;
        out.write_all(bytes)?;
        for _ in bytes.len()..padded {
            out.write_all(&[0])?;
        }
        write_i32(out, !to_id(id)?)?;
    }

    for record in records {
        let size = record_size(&record.target, (1 + 2 + record.deps.len()) * 4)?;
        write_u32(out, size | DEPS_RECORD_FLAG)?;
        write_i32(out, to_id(lookup(&table, &record.target)?)?)?;
        let (low, high) = split_mtime(record.mtime);
        write_u32(out, low)?;
        write_u32(out, high)?;
        for dep in &record.deps {
            write_u32(out, to_id(lookup(&table, dep)?)?.unsigned_abs())?;
        }
    }
    Ok(())
}

/// A decoded deps log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepsLog {
    /// Paths in id order.
    pub paths: Vec<String>,
    /// Dependency records in file order.
    pub records: Vec<DependencyRecord>,
}

/// Decode a deps log produced by [`encode`] or by Ninja itself.
///
/// # Errors
///
/// Returns a [`DepsLogError`] describing the first malformed record.
pub fn decode(bytes: &[u8]) -> Result<DepsLog, DepsLogError> {
    let mut reader = Reader { bytes, offset: 0 };
    if reader.take(SIGNATURE.len())? != SIGNATURE {
        return Err(DepsLogError::BadSignature);
    }
    let version = reader.i32()?;
    if version != VERSION {
        return Err(DepsLogError::UnsupportedVersion(version));
    }

    let mut log = DepsLog::default();
    while !reader.is_empty() {
        let header = reader.u32()?;
        let size = usize::try_from(header & !DEPS_RECORD_FLAG)
            .map_err(|_| DepsLogError::Truncated {
                offset: reader.offset,
            })?;
        if header & DEPS_RECORD_FLAG == 0 {
            read_path(&mut reader, size, &mut log)?;
        } else {
            read_deps(&mut reader, size, &mut log)?;
        }
    }
    Ok(log)
}

fn read_path(reader: &mut Reader<'_>, size: usize, log: &mut DepsLog) -> Result<(), DepsLogError> {
    let raw = reader.take(size.saturating_sub(4))?;
    let checksum = reader.i32()?;
    let found = i64::from(!checksum);
    if usize::try_from(found).ok() != Some(log.paths.len()) {
        return Err(DepsLogError::BadChecksum {
            expected: log.paths.len(),
            found,
        });
    }
    let trimmed: Vec<u8> = match raw.iter().rposition(|&b| b != 0) {
        Some(last) => raw.iter().take(last + 1).copied().collect(),
        None => Vec::new(),
    };
    log.paths.push(String::from_utf8(trimmed)?);
    Ok(())
}

fn read_deps(reader: &mut Reader<'_>, size: usize, log: &mut DepsLog) -> Result<(), DepsLogError> {
    let count = (size >> 2).saturating_sub(3);
    let target = resolve(log, i64::from(reader.i32()?))?;
    let low = reader.u32()?;
    let high = reader.u32()?;
    let mut deps = Vec::with_capacity(count);
    for _ in 0..count {
        deps.push(resolve(log, i64::from(reader.u32()?))?);
    }
    log.records.push(DependencyRecord {
        target,
        mtime: (u64::from(high) << 32) | u64::from(low),
        deps,
    });
    Ok(())
}

fn resolve(log: &DepsLog, id: i64) -> Result<String, DepsLogError> {
    usize::try_from(id)
        .ok()
        .and_then(|index| log.paths.get(index))
        .cloned()
        .ok_or(DepsLogError::UnknownId(id))
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DepsLogError> {
        let (head, tail) = self
            .bytes
            .split_at_checked(len)
            .ok_or(DepsLogError::Truncated {
                offset: self.offset,
            })?;
        self.bytes = tail;
        self.offset += len;
        Ok(head)
    }

    fn word(&mut self) -> Result<[u8; 4], DepsLogError> {
        let offset = self.offset;
        self.take(4)?
            .try_into()
            .map_err(|_| DepsLogError::Truncated { offset })
    }

    #[expect(clippy::little_endian_bytes, reason = "deps log is little-endian on disk")]
    fn u32(&mut self) -> Result<u32, DepsLogError> {
        self.word().map(u32::from_le_bytes)
    }

    #[expect(clippy::little_endian_bytes, reason = "deps log is little-endian on disk")]
    fn i32(&mut self) -> Result<i32, DepsLogError> {
        self.word().map(i32::from_le_bytes)
    }
}

fn lookup(table: &PathTable<'_>, path: &str) -> Result<usize, DepsLogError> {
    table
        .id(path)
        .ok_or_else(|| DepsLogError::UnknownId(i64::try_from(table.len()).unwrap_or(i64::MAX)))
}

fn to_id(index: usize) -> Result<i32, DepsLogError> {
    i32::try_from(index).map_err(|_| DepsLogError::TooManyPaths { count: index })
}

fn record_size(path: &str, size: usize) -> Result<u32, DepsLogError> {
    u32::try_from(size)
        .ok()
        .filter(|&s| s <= MAX_RECORD_SIZE)
        .ok_or_else(|| DepsLogError::RecordTooLarge {
            path: path.to_owned(),
            size,
        })
}

#[expect(clippy::cast_possible_truncation, reason = "each half is masked to 32 bits")]
const fn split_mtime(mtime: u64) -> (u32, u32) {
    ((mtime & 0xffff_ffff) as u32, (mtime >> 32) as u32)
}

#[expect(clippy::little_endian_bytes, reason = "deps log is little-endian on disk")]
fn write_u32<W: Write>(out: &mut W, value: u32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

#[expect(clippy::little_endian_bytes, reason = "deps log is little-endian on disk")]
fn write_i32<W: Write>(out: &mut W, value: i32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}
