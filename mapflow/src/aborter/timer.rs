//! Abort timers.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::time::Duration;
use tracing::trace;

use super::node::AborterNode;

/// A scheduled `abort()` that can be cancelled before it fires.
#[derive(Debug)]
pub(crate) enum AbortTimer {
    /// Timer running on the ambient tokio runtime.
    Task(tokio::task::JoinHandle<()>),
    /// Timer running on a detached thread that holds only a weak reference.
    /// Dropping the sender ends the thread early.
    Thread(Sender<()>),
}

impl AbortTimer {
    /// Schedules `abort()` on `node` after `delay`.
    ///
    /// Prefers the current tokio runtime and falls back to a detached thread
    /// when called outside of one.
    pub(crate) fn schedule(node: Weak<AborterNode>, delay: Duration) -> Self {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Self::Task(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                fire(&node);
            })),
            Err(_) => {
                let (wake, sleeper) = mpsc::channel::<()>();
                std::thread::spawn(move || {
                    if let Err(RecvTimeoutError::Timeout) = sleeper.recv_timeout(delay) {
                        fire(&node);
                    }
                });
                Self::Thread(wake)
            }
        }
    }

    /// Stops the timer from firing. A timer thread exits right away.
    pub(crate) fn cancel(self) {
        match self {
            Self::Task(handle) => handle.abort(),
            Self::Thread(wake) => drop(wake),
        }
    }
}

fn fire(node: &Weak<AborterNode>) {
    if let Some(node) = node.upgrade() {
        trace!(timeout_ms = node.timeout_ms(), "Aborter timer fired");
        AborterNode::abort(&node);
    }
}
