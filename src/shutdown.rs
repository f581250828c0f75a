//! Interrupt handling for the follow modes.
//!
//! The first interrupt cancels the scheduler's token and lets it flush. A
//! second one, while the scheduler is still stopping, abandons the task so
//! a sink stuck on a blocked write cannot hang the process.

use crate::error::TailError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    Graceful,
    Abort,
}

/// Shared stop signal. Cheap to clone; every clone sees the same count.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    requests: Arc<AtomicU32>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the scheduler to observe.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Record one interrupt. The first asks for a graceful stop, any later
    /// one for an abort.
    pub fn request(&self) -> ShutdownRequest {
        if self.requests.fetch_add(1, Ordering::SeqCst) == 0 {
            self.token.cancel();
            ShutdownRequest::Graceful
        } else {
            ShutdownRequest::Abort
        }
    }
}

/// Wait for `task` to finish, feeding interrupts from `interrupts` into
/// `shutdown`. Returns [`TailError::Aborted`] on a second interrupt.
pub async fn supervise<T>(
    mut task: JoinHandle<Result<T, TailError>>,
    shutdown: Shutdown,
    mut interrupts: mpsc::UnboundedReceiver<()>,
) -> Result<T, TailError> {
    let mut listening = true;
    loop {
        tokio::select! {
            joined = &mut task => {
                return match joined {
                    Ok(result) => result,
                    Err(e) => Err(TailError::Task(e.to_string())),
                };
            }
            received = interrupts.recv(), if listening => {
                if received.is_none() {
                    listening = false;
                    continue;
                }
                match shutdown.request() {
                    ShutdownRequest::Graceful => {
                        info!("interrupt received; finishing current work (interrupt again to abort)");
                    }
                    ShutdownRequest::Abort => {
                        warn!("second interrupt; aborting without flushing");
                        task.abort();
                        return Err(TailError::Aborted);
                    }
                }
            }
        }
    }
}

/// Forward Ctrl-C, and SIGTERM on unix, into a channel for [`supervise`].
pub fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();

    let ctrl_c = tx.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if ctrl_c.send(()).is_err() {
                break;
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut term) = signal(SignalKind::terminate()) else {
            warn!("could not install SIGTERM handler");
            return;
        };
        while term.recv().await.is_some() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    #[cfg(not(unix))]
    drop(tx);

    rx
}
