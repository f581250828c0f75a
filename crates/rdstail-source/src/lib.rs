//! rdstail-source: the remote log file API boundary.
//!
//! A [`LogSource`] can list an instance's rotated log files and fetch a page
//! of one of them from a [`Position`]. It holds no poll state: deciding which
//! file to read and from where is the marker tracker's job.

pub mod http;

pub use http::HttpLogSource;

use async_trait::async_trait;
use rdstail_core::{ErrorClass, Position, RawChunk, RemoteFile};
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a [`LogSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transient failure, or the retry budget ran out.
    #[error("log source unavailable: {0}")]
    Unavailable(String),

    /// The named file no longer exists; re-list and pick a new current file.
    #[error("log file {0} no longer exists")]
    RotatedAway(String),

    #[error("instance {0} has no log files")]
    NoLogFiles(String),

    /// The API answered with something we cannot interpret.
    #[error("unexpected response from log API: {0}")]
    Protocol(String),
}

impl SourceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SourceError::Unavailable(_) | SourceError::NoLogFiles(_) => ErrorClass::SourceUnavailable,
            SourceError::RotatedAway(_) => ErrorClass::FileRotatedAway,
            SourceError::Protocol(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.class().is_retriable()
    }
}

/// The paginated, rotating-file log API.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// List the instance's log files. Order is unspecified.
    async fn list_files(&self, instance: &str) -> Result<Vec<RemoteFile>, SourceError>;

    /// Fetch up to `max_lines` lines of `file` from `position`
    /// ([`rdstail_core::WHOLE_FILE`] for no limit). A marker issued for a
    /// different file is treated as [`Position::Start`].
    async fn fetch(
        &self,
        instance: &str,
        file: &RemoteFile,
        position: Position,
        max_lines: u64,
    ) -> Result<RawChunk, SourceError>;

    /// Whether [`Position::Tail`] is served natively.
    fn supports_tail(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn list_files(&self, instance: &str) -> Result<Vec<RemoteFile>, SourceError> {
        (**self).list_files(instance).await
    }

    async fn fetch(
        &self,
        instance: &str,
        file: &RemoteFile,
        position: Position,
        max_lines: u64,
    ) -> Result<RawChunk, SourceError> {
        (**self).fetch(instance, file, position, max_lines).await
    }

    fn supports_tail(&self) -> bool {
        (**self).supports_tail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes() {
        assert_eq!(SourceError::Unavailable("x".into()).class(), ErrorClass::SourceUnavailable);
        assert_eq!(SourceError::NoLogFiles("db".into()).class(), ErrorClass::SourceUnavailable);
        assert_eq!(SourceError::RotatedAway("f".into()).class(), ErrorClass::FileRotatedAway);
        assert_eq!(SourceError::Protocol("x".into()).class(), ErrorClass::Fatal);
        assert!(SourceError::RotatedAway("f".into()).is_retriable());
        assert!(!SourceError::Protocol("x".into()).is_retriable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SourceError::RotatedAway("error/postgresql.log.2024-01-01-10".into()).to_string(),
            "log file error/postgresql.log.2024-01-01-10 no longer exists"
        );
    }
}
