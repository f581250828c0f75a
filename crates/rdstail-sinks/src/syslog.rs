//! Remote collector sink: RFC 5424 syslog over a persistent TCP connection.
//!
//! Every [`LogicalEntry`] becomes exactly one frame. Frames use RFC 6587
//! octet counting (`LEN SP SYSLOG-MSG`), so the continuation lines of a
//! multi-line entry stay inside a single frame.
//!
//! ```text
//! 87 <14>1 2024-01-15T10:00:00.000Z db-host rdstail - - - 2024-01-15 ERROR boom
//!   at foo()
//! ```
//!
//! A failed write drops the connection, waits, reconnects and retries the
//! same frame, up to the configured budget; after that the error is fatal.
//! A connection the collector has already closed is replaced before the
//! write rather than after it.

use crate::{Sink, SinkError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rdstail_core::config::CollectorConfig;
use rdstail_core::syslog::{priority, Facility, Severity};
use rdstail_core::{LogicalEntry, RetryPolicy};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

const MAX_HOSTNAME_LEN: usize = 255;
const MAX_APP_NAME_LEN: usize = 48;

/// Settings for [`SyslogSink`], resolved from the `[collector]` section.
#[derive(Debug, Clone)]
pub struct SyslogSinkConfig {
    pub address: String,
    pub app_name: String,
    pub hostname: String,
    pub facility: Facility,
    pub severity: Severity,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
}

impl SyslogSinkConfig {
    /// Resolve `collector` into sink settings. The local hostname is looked
    /// up here, once, unless the configuration overrides it.
    pub fn resolve(collector: &CollectorConfig, address: &str) -> Self {
        let hostname = collector.hostname.clone().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        });

        Self {
            address: address.to_string(),
            app_name: collector.app_name.clone(),
            hostname,
            facility: collector.facility,
            severity: collector.severity,
            retry: RetryPolicy::new(
                collector.max_retries,
                collector.retry_backoff,
                collector.retry_backoff.saturating_mul(8),
            ),
            connect_timeout: collector.connect_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame encoding
// ---------------------------------------------------------------------------

/// One RFC 5424 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogFrame<'a> {
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
    pub hostname: &'a str,
    pub app_name: &'a str,
    pub body: &'a str,
}

impl SyslogFrame<'_> {
    /// The SYSLOG-MSG without framing.
    pub fn message(&self) -> String {
        format!(
            "<{}>1 {} {} {} - - - {}",
            self.priority,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            header_field(self.hostname, MAX_HOSTNAME_LEN),
            header_field(self.app_name, MAX_APP_NAME_LEN),
            self.body,
        )
    }

    /// The octet-counted frame as written to the wire.
    pub fn encode(&self) -> Vec<u8> {
        let message = self.message();
        let mut frame = format!("{} ", message.len()).into_bytes();
        frame.extend_from_slice(message.as_bytes());
        frame
    }
}

/// Header fields are PRINTUSASCII without spaces; `-` stands for empty.
fn header_field(raw: &str, max_len: usize) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '_' })
        .take(max_len)
        .collect();
    if cleaned.is_empty() {
        "-".to_string()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Forwards entries to a syslog collector.
pub struct SyslogSink {
    config: SyslogSinkConfig,
    priority: u8,
    conn: Option<BufWriter<TcpStream>>,
}

impl SyslogSink {
    /// Connect to the collector. Failing to connect here is reported
    /// immediately rather than retried.
    pub async fn connect(config: SyslogSinkConfig) -> Result<Self, SinkError> {
        let stream = open(&config).await.map_err(|source| SinkError::Connect {
            address: config.address.clone(),
            source,
        })?;
        info!(address = %config.address, hostname = %config.hostname, "connected to syslog collector");

        Ok(Self {
            priority: priority(config.facility, config.severity),
            config,
            conn: Some(BufWriter::new(stream)),
        })
    }

    pub fn config(&self) -> &SyslogSinkConfig {
        &self.config
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.conn.as_ref().is_some_and(hung_up) {
            debug!(address = %self.config.address, "syslog collector closed the connection");
            self.conn = None;
        }
        if self.conn.is_none() {
            let stream = open(&self.config).await?;
            debug!(address = %self.config.address, "reconnected to syslog collector");
            self.conn = Some(BufWriter::new(stream));
        }
        if let Some(conn) = self.conn.as_mut() {
            conn.write_all(frame).await?;
            conn.flush().await?;
        }
        Ok(())
    }
}

/// A collector never writes back, so a readable end-of-stream means it has
/// closed its side. Writing into that socket would appear to succeed and
/// lose the frame.
fn hung_up(conn: &BufWriter<TcpStream>) -> bool {
    let mut scratch = [0u8; 1];
    matches!(conn.get_ref().try_read(&mut scratch), Ok(0))
}

async fn open(config: &SyslogSinkConfig) -> io::Result<TcpStream> {
    match tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.address.as_str())).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    }
}

#[async_trait]
impl Sink for SyslogSink {
    async fn send(&mut self, entry: &LogicalEntry) -> Result<(), SinkError> {
        let body = entry
            .lines
            .iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        let frame = SyslogFrame {
            priority: self.priority,
            timestamp: Utc::now(),
            hostname: &self.config.hostname,
            app_name: &self.config.app_name,
            body: &body,
        }
        .encode();

        let mut attempt = 0;
        loop {
            let error = match self.write_frame(&frame).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            self.conn = None;

            if !self.config.retry.allows(attempt) {
                return Err(SinkError::Delivery {
                    address: self.config.address.clone(),
                    attempts: attempt + 1,
                    source: error,
                });
            }
            let delay = self.config.retry.backoff(attempt);
            warn!(address = %self.config.address, attempt, ?delay, %error, "syslog write failed; reconnecting");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut conn) = self.conn.take() {
            conn.flush().await?;
            conn.shutdown().await?;
        }
        Ok(())
    }
}
