//! Core types for rdstail-core.
//!
//! This module defines the data that moves through one poll cycle: the
//! [`RemoteFile`] listing entries, the [`Marker`] continuation tokens scoped
//! to them, the [`RawChunk`] returned by a fetch, and the [`LogicalEntry`]
//! records handed to sinks.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// `max_lines` sentinel meaning "the entire file".
pub const WHOLE_FILE: u64 = 0;

/// One rotated log file as reported by the remote listing.
///
/// Files are ordered by last-written time, then by name, so the *current*
/// file is simply the maximum of a listing. Equal timestamps resolve to the
/// lexicographically greatest name, which matches how rotated files carry
/// increasing sequence suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFile {
    pub name: String,
    pub last_written: DateTime<Utc>,
    /// Size in bytes at the time of listing.
    pub size: u64,
}

impl RemoteFile {
    pub fn new(name: impl Into<String>, last_written: DateTime<Utc>, size: u64) -> Self {
        Self {
            name: name.into(),
            last_written,
            size,
        }
    }

    /// Pick the current file of a listing.
    pub fn latest(files: &[RemoteFile]) -> Option<&RemoteFile> {
        files.iter().max()
    }

    /// True when `self` supersedes `current`: a different file that was
    /// written strictly later.
    pub fn supersedes(&self, current: &RemoteFile) -> bool {
        self.name != current.name && self.last_written > current.last_written
    }
}

impl Ord for RemoteFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.last_written
            .cmp(&other.last_written)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.size.cmp(&other.size))
    }
}

impl PartialOrd for RemoteFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Opaque continuation token, valid only for the file it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    file: String,
    token: String,
}

impl Marker {
    pub fn new(file: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            token: token.into(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_for(&self, file: &RemoteFile) -> bool {
        self.file == file.name
    }
}

/// Where a fetch starts reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Byte 0 of the file.
    Start,
    /// Continue after a previously issued marker.
    After(Marker),
    /// The API-native "last N lines" mode.
    Tail,
}

impl Position {
    /// Resolve this position against `file`. A marker issued for another
    /// file is meaningless there and degrades to [`Position::Start`].
    pub fn scoped_to(self, file: &RemoteFile) -> Position {
        match self {
            Position::After(marker) if !marker.is_for(file) => Position::Start,
            other => other,
        }
    }
}

/// The result of one fetch: raw text, the marker to continue from, and
/// whether the file had no more data pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub data: String,
    pub marker: Marker,
    pub end_of_file: bool,
}

impl RawChunk {
    /// The newline-terminated lines of this chunk, continuing `partial`.
    ///
    /// A page may end mid-line, either because the writer has not finished
    /// the line yet or because the API cut the page there. Whatever follows
    /// the last `\n` is left in `partial` to be completed by the next chunk
    /// of the same file. Only `\n` is stripped, so a CRLF line keeps its
    /// `\r`.
    pub fn complete_lines(&self, partial: &mut String) -> Vec<String> {
        partial.push_str(&self.data);
        let Some(end) = partial.rfind('\n') else {
            return Vec::new();
        };
        let rest = partial.split_off(end + 1);
        let complete = std::mem::replace(partial, rest);
        complete[..end].split('\n').map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One semantic record, possibly spanning several physical lines.
///
/// The first line matched the boundary pattern (or the stream began without
/// one); every following line is a continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalEntry {
    /// Name of the remote file the entry was read from.
    pub file: String,
    pub lines: Vec<String>,
}

impl LogicalEntry {
    pub fn new(file: impl Into<String>, first_line: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            lines: vec![first_line.into()],
        }
    }

    pub fn push(&mut self, continuation: impl Into<String>) {
        self.lines.push(continuation.into());
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }

    /// Continuation lines joined with `\n`, without a trailing terminator.
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }

    /// The entry as it appeared in the file: every line newline-terminated.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
