//! Shared test utilities for rdstail integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. The fakes share state behind `Arc`s so a test can keep
//! a handle after moving the fake into the code under test.

#![allow(dead_code)]

pub mod fake_log_api;
pub mod fake_source;
pub mod fixtures;
pub mod recording_sink;

pub use fake_log_api::FakeLogApi;
pub use fake_source::{Call, FakeSource, Failure};
pub use fixtures::*;
pub use recording_sink::{Behavior, Recorded, RecordingSink};
