//! Log corpora and constructors used across harnesses.

use rdstail::tracker::{MarkerTracker, StartPosition, TrackerConfig};
use rdstail_core::{LogicalEntry, WHOLE_FILE};

pub const INSTANCE: &str = "orders-db";

/// Boundary pattern for `YYYY-MM-DD ` prefixed lines.
pub const TIMESTAMP_PREFIX: &str = r"\d{4}-\d{2}-\d{2} ";

pub const FIRST_FILE: &str = "error/postgresql.log.2024-01-15-10";
pub const SECOND_FILE: &str = "error/postgresql.log.2024-01-15-11";
pub const THIRD_FILE: &str = "error/postgresql.log.2024-01-15-12";

/// A PostgreSQL-style log with one multi-line entry in the middle.
pub const STACK_TRACE_LOG: &[&str] = &[
    "2024-01-15 10:00:00 UTC LOG:  checkpoint starting: time",
    "2024-01-15 10:00:01 UTC ERROR:  relation \"orders_archive\" does not exist at character 15",
    "\tSTATEMENT:  SELECT * FROM orders_archive",
    "\t  WHERE placed_at < now() - interval '90 days'",
    "2024-01-15 10:00:02 UTC LOG:  checkpoint complete: wrote 12 buffers",
];

/// Numbered single-line entries `"2024-01-15 line {i}"` for `range`.
pub fn numbered(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("2024-01-15 line {i}")).collect()
}

pub fn refs(lines: &[String]) -> Vec<&str> {
    lines.iter().map(String::as_str).collect()
}

/// Tracker that reads the current file from its start and lets the API
/// choose page sizes.
pub fn from_start_config() -> TrackerConfig {
    TrackerConfig {
        start: StartPosition::FromStart,
        page_lines: WHOLE_FILE,
        max_pages_per_tick: 64,
    }
}

pub fn tail_config(backfill_lines: u64) -> TrackerConfig {
    TrackerConfig {
        start: StartPosition::Tail { backfill_lines },
        ..from_start_config()
    }
}

pub fn tracker<S: rdstail_source::LogSource>(source: S, config: TrackerConfig) -> MarkerTracker<S> {
    MarkerTracker::new(source, INSTANCE, config)
}

pub fn entry(file: &str, lines: &[&str]) -> LogicalEntry {
    let mut entry = LogicalEntry::new(file, lines[0]);
    for line in &lines[1..] {
        entry.push(*line);
    }
    entry
}
