//! `.ninja_log` writer.
//!
//! Ninja decides whether a command line changed by comparing the hash of the
//! command it would run with the hash stored in the log. Seeding the log
//! with the commands `make` already ran lets Ninja treat the tree as up to
//! date.

use crate::graph::CommandLogEntry;
use crate::hasher::command_hash;
use std::io::{self, Write};

/// First line of a version 5 build log.
pub const HEADER: &str = "# ninja log v5";

/// Write `entries` as a build log to `out`.
///
/// The start time, end time and mtime columns are always `0`.
///
/// # Errors
///
/// Returns an [`io::Error`] if writing fails.
///
/// # Examples
///
/// ```
/// use kninja::build_log::write_log;
/// use kninja::graph::CommandLogEntry;
///
/// let entries = [CommandLogEntry { target: "a.o".into(), mtime: 7, command: "cc".into() }];
/// let mut out = Vec::new();
/// write_log(&mut out, &entries).expect("write");
/// assert_eq!(out, b"# ninja log v5\n0\t0\t0\ta.o\tac157b38cd2e901b\n");
/// ```
pub fn write_log<W: Write>(out: &mut W, entries: &[CommandLogEntry]) -> io::Result<()> {
    writeln!(out, "{HEADER}")?;
    for entry in entries {
        writeln!(
            out,
            "0\t0\t0\t{}\t{:x}",
            entry.target,
            command_hash(&entry.command)
        )?;
    }
    Ok(())
}
