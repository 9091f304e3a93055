//! Generic polling loop.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::PollerOptions;
use crate::aborter::Aborter;
use crate::errors::{CancellationError, Result, ServiceError};

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The operation is still running.
    Pending {
        /// Service-suggested wait before the next poll.
        retry_after: Option<Duration>,
    },
    /// The operation finished.
    Done(T),
}

/// Calls `poll_fn` until it reports [`PollStatus::Done`].
///
/// Each poll receives a fresh child of `aborter` carrying
/// `options.poll_timeout_ms`, so a hung poll is cut off without affecting the
/// ancestor. Aborting `aborter` stops the loop at the next poll or during the
/// wait between polls. Errors from `poll_fn` end the loop unchanged.
///
/// A poll that outlives `poll_timeout_ms` is not retried: its child fires,
/// a pipeline send under it returns [`MapflowError::Cancelled`], and that
/// error ends the loop while `aborter` itself stays live.
///
/// [`MapflowError::Cancelled`]: crate::errors::MapflowError::Cancelled
pub async fn poll_until_done<T, F, Fut>(
    aborter: &Aborter,
    options: &PollerOptions,
    mut poll_fn: F,
) -> Result<T>
where
    F: FnMut(Aborter) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    let mut polls: u32 = 0;
    loop {
        aborter.check("before poll")?;
        if let Some(max_polls) = options.max_polls {
            if polls >= max_polls {
                return Err(ServiceError::new(format!(
                    "operation still pending after {polls} polls"
                ))
                .with_attempts(polls)
                .into());
            }
        }
        polls += 1;

        let poll_aborter = aborter.with_timeout(options.poll_timeout_ms);
        let outcome = poll_fn(poll_aborter.clone()).await;
        // Stops the per-poll timer.
        poll_aborter.abort();

        match outcome? {
            PollStatus::Done(value) => {
                debug!(polls, "Long-running operation finished");
                return Ok(value);
            }
            PollStatus::Pending { retry_after } => {
                let wait = retry_after.unwrap_or_else(|| options.poll_interval());
                debug!(
                    polls,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "Operation pending"
                );
                wait_or_abort(aborter, wait).await?;
            }
        }
    }
}

/// Sleeps for `wait` unless `aborter` fires first.
pub(crate) async fn wait_or_abort(aborter: &Aborter, wait: Duration) -> std::result::Result<(), CancellationError> {
    aborter.check("before poll delay")?;
    if wait.is_zero() {
        return Ok(());
    }
    tokio::select! {
        () = tokio::time::sleep(wait) => Ok(()),
        () = aborter.aborted() => Err(CancellationError::new("during poll delay")),
    }
}
