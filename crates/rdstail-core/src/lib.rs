//! rdstail-core: shared data model for rdstail.
//!
//! This crate owns everything the pipeline layers agree on: the shape of a
//! remote log file and its continuation markers, the logical entries that
//! flow to sinks, the error taxonomy, configuration, and the multi-line
//! reassembler.
//!
//! # Architecture
//!
//! ```text
//! LogSource ──► MarkerTracker ──► Reassembler ──► Sink
//!                     ▲                              │
//!                     └──────── PollScheduler ───────┘
//! ```
//!
//! The scheduler owns all mutable poll state; every other layer is either
//! stateless or owns state that is invisible to the scheduler.

pub mod config;
pub mod error;
pub mod reassembler;
pub mod retry;
pub mod syslog;
pub mod types;

pub use error::{ConfigError, ErrorClass};
pub use reassembler::{ReassemblyBuffer, Reassembler};
pub use retry::RetryPolicy;
pub use types::{LogicalEntry, Marker, Position, RawChunk, RemoteFile, WHOLE_FILE};
