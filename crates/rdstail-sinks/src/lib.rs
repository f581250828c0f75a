//! rdstail-sinks: destinations for reassembled log entries.
//!
//! A [`Sink`] accepts [`LogicalEntry`] values in order and delivers them
//! somewhere: the terminal ([`ConsoleSink`]) or a remote syslog collector
//! ([`SyslogSink`]). Reconnect state lives inside the sink; callers only see
//! success or a [`SinkError`] once the sink's own retry budget is spent.

pub mod console;
pub mod syslog;

pub use console::ConsoleSink;
pub use syslog::{SyslogFrame, SyslogSink, SyslogSinkConfig};

use async_trait::async_trait;
use rdstail_core::{ErrorClass, LogicalEntry};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery to {address} failed after {attempts} attempts: {source}")]
    Delivery {
        address: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::SinkFailure
    }
}

/// Ordered destination for logical entries.
#[async_trait]
pub trait Sink: Send {
    async fn send(&mut self, entry: &LogicalEntry) -> Result<(), SinkError>;

    /// Push buffered output through. Called once per poll cycle.
    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Flush and release the destination. Further sends are undefined.
    async fn close(&mut self) -> Result<(), SinkError> {
        self.flush().await
    }
}

#[async_trait]
impl<T: Sink + ?Sized> Sink for Box<T> {
    async fn send(&mut self, entry: &LogicalEntry) -> Result<(), SinkError> {
        (**self).send(entry).await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush().await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }
}
