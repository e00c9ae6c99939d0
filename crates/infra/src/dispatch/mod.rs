//! Rate-limited, strictly serialized dispatch of outbound platform calls.
//!
//! ## Design
//!
//! - One queue per platform, each drained by exactly one dedicated worker thread
//! - Bounded FIFO buffer: submitting blocks once it is full, nothing is dropped
//! - Optional pause after every job (the platform's rate limit)
//! - Results travel back to the submitter over a one-shot channel, verbatim
//!
//! There is no retry: a failed call is the caller's to handle.
//!
//! ## Components
//!
//! - `DispatchQueue`: cloneable submission side of a queue
//! - `QueueHandle`: owner of the worker thread, used for shutdown
//! - `Pending`: the submitter's side of one typed job

pub mod job;
pub mod queue;

pub use job::{Job, JobId, JobOutcome, Pending};
pub use queue::{DispatchQueue, DispatchStats, QueueConfig, QueueHandle, RateLimit, QUEUE_SIZE};

use std::time::Duration;

/// Failures produced by the queue itself rather than by a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The job was dropped without producing a result: the worker has
    /// stopped, or the job panicked.
    #[error("dispatch job abandoned before producing a result")]
    Abandoned,
    /// The caller stopped waiting. The job itself still runs.
    #[error("gave up waiting for dispatch result after {0:?}")]
    TimedOut(Duration),
}
