//! Multi-line reassembly.
//!
//! Groups consecutive raw lines into [`LogicalEntry`] values using a boundary
//! pattern that matches the first line of each entry. The trailing entry of
//! a batch stays in a [`ReassemblyBuffer`] because the remote file may still
//! be appending continuation lines to it; it is only released early by
//! [`Reassembler::flush`] (rotation and shutdown).
//!
//! Every input line ends up in exactly one entry, in input order. A stream
//! whose first line does not match the pattern still produces an entry for
//! it rather than dropping it.

use crate::error::ConfigError;
use crate::types::LogicalEntry;
use regex::Regex;

/// The possibly-incomplete trailing entry carried across poll cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyBuffer {
    pending: Option<LogicalEntry>,
}

impl ReassemblyBuffer {
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending(&self) -> Option<&LogicalEntry> {
        self.pending.as_ref()
    }
}

/// Splits a line stream into logical entries.
#[derive(Debug, Clone)]
pub struct Reassembler {
    /// `None` means every line starts a new entry.
    boundary: Option<Regex>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::every_line()
    }
}

impl Reassembler {
    /// Build from a prefix pattern. The pattern is anchored at the start of
    /// the line; an empty pattern matches every line.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Ok(Self::every_line());
        }
        let boundary =
            Regex::new(&format!("^(?:{pattern})")).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            boundary: Some(boundary),
        })
    }

    pub fn every_line() -> Self {
        Self { boundary: None }
    }

    pub fn is_boundary(&self, line: &str) -> bool {
        self.boundary.as_ref().map_or(true, |re| re.is_match(line))
    }

    /// Feed one batch of lines read from `file`, returning the entries that
    /// are now known to be complete.
    ///
    /// Without a boundary pattern every line is complete on arrival and the
    /// buffer is left empty.
    pub fn feed<I, S>(&self, file: &str, buffer: &mut ReassemblyBuffer, lines: I) -> Vec<LogicalEntry>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut complete = Vec::new();

        for line in lines {
            let line = line.into();

            if self.boundary.is_none() {
                complete.extend(buffer.pending.take());
                complete.push(LogicalEntry::new(file, line));
                continue;
            }

            if !self.is_boundary(&line) {
                if let Some(entry) = buffer.pending.as_mut() {
                    entry.push(line);
                    continue;
                }
                // Nothing to continue: start an entry anyway.
            }
            complete.extend(buffer.pending.replace(LogicalEntry::new(file, line)));
        }

        complete
    }

    /// Release the trailing entry regardless of completeness.
    pub fn flush(&self, buffer: &mut ReassemblyBuffer) -> Option<LogicalEntry> {
        buffer.pending.take()
    }
}
