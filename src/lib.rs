//! rdstail: follow a managed database's rotating log files.
//!
//! The remote API is stateless, paginated by opaque markers and rotates
//! files under the reader. This crate turns it into an ordered tail stream
//! that behaves like `tail -f`, optionally reassembling multi-line entries
//! and forwarding them to a syslog collector.
//!
//! # Architecture
//!
//! ```text
//! LogSource ──► MarkerTracker ──► Reassembler ──► Sink
//!                     ▲                              │
//!                     └──────── PollScheduler ───────┘
//! ```
//!
//! The scheduler runs on one background task and is the only owner of poll
//! state. The main task waits on it and on interrupts; the cancellation
//! token is all they share.

pub mod app;
pub mod cli;
pub mod error;
pub mod exit;
pub mod scheduler;
pub mod shutdown;
pub mod snapshot;
pub mod tracker;

pub use error::TailError;
pub use scheduler::{Phase, PollScheduler, PollState, PollSummary};
pub use tracker::{Advance, Cursor, MarkerTracker, StartPosition, Step, TrackerConfig};
