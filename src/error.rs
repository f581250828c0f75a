//! Top-level error for the tail pipeline and the process boundary.

use rdstail_core::{ConfigError, ErrorClass};
use rdstail_sinks::SinkError;
use rdstail_source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("aborted on second interrupt")]
    Aborted,

    #[error("poll task failed: {0}")]
    Task(String),
}

impl TailError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TailError::Config(e) => e.class(),
            TailError::Source(e) => e.class(),
            TailError::Sink(e) => e.class(),
            TailError::Aborted | TailError::Task(_) => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_follows_the_wrapped_error() {
        assert_eq!(TailError::from(ConfigError::MissingInstance).class(), ErrorClass::Configuration);
        assert_eq!(
            TailError::from(SourceError::Unavailable("throttled".into())).class(),
            ErrorClass::SourceUnavailable
        );
        assert_eq!(
            TailError::from(SourceError::Protocol("bad json".into())).class(),
            ErrorClass::Fatal
        );
        assert_eq!(TailError::Aborted.class(), ErrorClass::Fatal);
    }

    #[test]
    fn transparent_display() {
        let err = TailError::from(SourceError::RotatedAway("a.log".into()));
        assert_eq!(err.to_string(), "log file a.log no longer exists");
    }
}
