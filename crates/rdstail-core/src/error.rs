//! Error taxonomy shared by every layer.
//!
//! Each crate defines its own `thiserror` enum; all of them map onto an
//! [`ErrorClass`], which is what the scheduler consults when deciding whether
//! to retry on the next tick or abort.

use thiserror::Error;

/// How an error is handled once it reaches the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Missing or invalid settings. Reported before polling starts.
    Configuration,
    /// Transient remote-read failure. Retried on the next tick.
    SourceUnavailable,
    /// The file being read was retired. Handled by rotating.
    FileRotatedAway,
    /// The sink exhausted its retry budget.
    SinkFailure,
    /// Anything else.
    Fatal,
}

impl ErrorClass {
    /// Whether the scheduler keeps ticking after an error of this class.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorClass::SourceUnavailable | ErrorClass::FileRotatedAway)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Configuration => write!(f, "configuration"),
            ErrorClass::SourceUnavailable => write!(f, "source-unavailable"),
            ErrorClass::FileRotatedAway => write!(f, "file-rotated-away"),
            ErrorClass::SinkFailure => write!(f, "sink-failure"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--instance is required")]
    MissingInstance,

    #[error("--collector is required for forwarding")]
    MissingCollector,

    #[error("invalid boundary pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("poll rate must be greater than zero")]
    ZeroRate,

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Configuration
    }
}
