//! [`Sink`] that records what it receives.
//!
//! The sink itself is moved into the scheduler; tests inspect the shared
//! [`Recorded`] handle afterwards.

use async_trait::async_trait;
use rdstail_core::LogicalEntry;
use rdstail_sinks::{Sink, SinkError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct Recorded {
    entries: Mutex<Vec<LogicalEntry>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

impl Recorded {
    pub fn entries(&self) -> Vec<LogicalEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Every delivered line, entries flattened in order.
    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().flat_map(|e| e.lines).collect()
    }

    pub fn first_lines(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.first_line().to_string()).collect()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    #[default]
    Accept,
    /// Fail every send with a delivery error.
    Fail,
    /// Never complete a send, like a write stuck on a dead connection.
    Block,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recorded: Arc<Recorded>,
    behavior: Behavior,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Arc<Recorded> {
        Arc::clone(&self.recorded)
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send(&mut self, entry: &LogicalEntry) -> Result<(), SinkError> {
        match self.behavior {
            Behavior::Accept => {
                self.recorded.entries.lock().unwrap().push(entry.clone());
                Ok(())
            }
            Behavior::Fail => Err(SinkError::Delivery {
                address: "recording".into(),
                attempts: 1,
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "injected"),
            }),
            Behavior::Block => std::future::pending().await,
        }
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.recorded.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.recorded.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
