//! Long-running operations.
//!
//! [`poll_until_done`] drives any status check until it reports completion;
//! [`LroPoller`] applies it to the `202 Accepted` + `Location` protocol over a
//! [`Pipeline`](crate::pipeline::Pipeline).

mod options;
mod poll;
mod poller;

pub use options::PollerOptions;
pub use poll::{poll_until_done, PollStatus};
pub use poller::{parse_retry_after, LroPoller};
