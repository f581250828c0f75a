//! Process exit codes.

use crate::error::TailError;
use rdstail_core::ErrorClass;

pub mod codes {
    pub const SUCCESS: i32 = 0;
    /// Bad flags or configuration.
    pub const CONFIG: i32 = 1;
    /// The log API stayed unavailable or the file vanished.
    pub const SOURCE: i32 = 2;
    /// The collector could not be reached or written to.
    pub const SINK: i32 = 3;
    /// Protocol violations and internal failures.
    pub const INTERNAL: i32 = 4;
    /// Forced abort on a second interrupt (128 + SIGINT).
    pub const ABORTED: i32 = 130;
}

pub fn exit_code(error: &TailError) -> i32 {
    if matches!(error, TailError::Aborted) {
        return codes::ABORTED;
    }
    match error.class() {
        ErrorClass::Configuration => codes::CONFIG,
        ErrorClass::SourceUnavailable | ErrorClass::FileRotatedAway => codes::SOURCE,
        ErrorClass::SinkFailure => codes::SINK,
        ErrorClass::Fatal => codes::INTERNAL,
    }
}
