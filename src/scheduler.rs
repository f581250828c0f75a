//! Poll scheduler: drives the tail loop and owns all mutable poll state.
//!
//! Each tick runs tracker → reassembler → sink in order and commits the new
//! [`PollState`] only after the sink accepted every entry. A tick that fails
//! with a retriable source error leaves the state untouched, so the next
//! tick re-reads from the same marker. Anything else aborts the run.
//!
//! ```text
//! Idle ──► Running ──► Stopping ──► Stopped
//!             │
//!             └──────► Aborted
//! ```

use crate::error::TailError;
use crate::tracker::{Advance, Cursor, MarkerTracker, Step};
use rdstail_core::{LogicalEntry, Reassembler, ReassemblyBuffer};
use rdstail_sinks::{Sink, SinkError};
use rdstail_source::{LogSource, SourceError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopping,
    Stopped,
    Aborted,
}

/// Everything carried from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub cursor: Cursor,
    pub buffer: ReassemblyBuffer,
}

/// Counters for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub ticks: u64,
    pub entries: u64,
    pub rotations: u64,
    pub transient_failures: u64,
}

pub struct PollScheduler<S, K> {
    tracker: MarkerTracker<S>,
    reassembler: Reassembler,
    sink: K,
    rate: Duration,
    state: PollState,
    summary: PollSummary,
    phase: watch::Sender<Phase>,
}

impl<S: LogSource, K: Sink> PollScheduler<S, K> {
    pub fn new(tracker: MarkerTracker<S>, reassembler: Reassembler, sink: K, rate: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            tracker,
            reassembler,
            sink,
            rate,
            state: PollState::default(),
            summary: PollSummary::default(),
            phase,
        }
    }

    /// Observe phase transitions from outside the scheduler task.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn summary(&self) -> PollSummary {
        self.summary
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run one tick without the timer. Tests use this to step the loop.
    pub async fn tick(&mut self) -> Result<(), TailError> {
        self.summary.ticks += 1;
        let advance = self.tracker.advance(&self.state.cursor).await;
        self.settle(advance).await
    }

    async fn settle(&mut self, advance: Result<Advance, SourceError>) -> Result<(), TailError> {
        match advance {
            Ok(advance) => Ok(self.deliver(advance).await?),
            Err(SourceError::RotatedAway(file)) => {
                self.summary.transient_failures += 1;
                debug!(file = %file, "listing still shows a rotated file; retrying next tick");
                Ok(())
            }
            Err(e) if e.is_retriable() => {
                self.summary.transient_failures += 1;
                warn!(instance = %self.tracker.instance(), error = %e, "poll failed; retrying next tick");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Tick at the configured rate until `cancel` fires, then flush and
    /// close the sink.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<PollSummary, TailError> {
        self.phase.send_replace(Phase::Running);
        info!(instance = %self.tracker.instance(), rate = ?self.rate, "tailing started");

        // First tick fires immediately.
        let mut ticker = tokio::time::interval(self.rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.summary.ticks += 1;
            // An abandoned fetch commits nothing.
            let advance = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.tracker.advance(&self.state.cursor) => result,
            };

            let outcome = self.settle(advance).await;
            if let Err(e) = outcome {
                return Err(self.abort(e).await);
            }
        }

        self.stop().await
    }

    /// Reassemble and dispatch one advance, then commit.
    async fn deliver(&mut self, advance: Advance) -> Result<(), SinkError> {
        let mut buffer = self.state.buffer.clone();
        let mut entries = Vec::new();
        let mut rotations = 0;

        for step in advance.steps {
            match step {
                Step::Rotated { from, to } => {
                    // The pending entry belongs to the old file.
                    entries.extend(self.reassembler.flush(&mut buffer));
                    match from {
                        Some(from) => {
                            rotations += 1;
                            info!(from = %from, to = %to.name, "log file rotated");
                        }
                        None => info!(file = %to.name, "following log file"),
                    }
                }
                Step::Lines { file, lines } => {
                    entries.extend(self.reassembler.feed(&file, &mut buffer, lines));
                }
            }
        }

        for entry in &entries {
            self.sink.send(entry).await?;
        }
        self.sink.flush().await?;

        debug!(entries = entries.len(), caught_up = advance.caught_up, "tick committed");
        self.state = PollState {
            cursor: advance.cursor,
            buffer,
        };
        self.summary.entries += entries.len() as u64;
        self.summary.rotations += rotations;
        Ok(())
    }

    async fn stop(mut self) -> Result<PollSummary, TailError> {
        self.phase.send_replace(Phase::Stopping);
        info!("stopping; flushing pending entry");

        for entry in self.take_pending() {
            if let Err(e) = self.sink.send(&entry).await {
                return Err(self.abort(e.into()).await);
            }
            self.summary.entries += 1;
        }
        if let Err(e) = self.sink.close().await {
            return Err(self.abort(e.into()).await);
        }

        self.phase.send_replace(Phase::Stopped);
        info!(
            ticks = self.summary.ticks,
            entries = self.summary.entries,
            rotations = self.summary.rotations,
            "tailing stopped"
        );
        Ok(self.summary)
    }

    /// Everything still owed to the sink when the run ends: an unterminated
    /// last line becomes a line of its own, then the pending entry is
    /// released.
    fn take_pending(&mut self) -> Vec<LogicalEntry> {
        let mut entries = Vec::new();
        if let Some(following) = self.state.cursor.following.as_mut() {
            if !following.partial.is_empty() {
                let line = std::mem::take(&mut following.partial);
                entries.extend(
                    self.reassembler
                        .feed(&following.file.name, &mut self.state.buffer, [line]),
                );
            }
        }
        entries.extend(self.reassembler.flush(&mut self.state.buffer));
        entries
    }

    /// Best-effort close after a fatal error. The original error wins.
    async fn abort(&mut self, error: TailError) -> TailError {
        error!(error = %error, class = %error.class(), "tailing aborted");
        if !matches!(error, TailError::Sink(_)) {
            for entry in self.take_pending() {
                if let Err(e) = self.sink.send(&entry).await {
                    warn!(error = %e, "could not deliver pending entry during abort");
                    break;
                }
            }
            if let Err(e) = self.sink.close().await {
                warn!(error = %e, "could not close sink during abort");
            }
        }
        self.phase.send_replace(Phase::Aborted);
        error
    }
}
