//! Jobs and their one-shot result channels.

use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DispatchError;

/// Unique job identifier, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the worker learns about a job once it ran.
///
/// The value itself goes to the submitter; the worker only keeps counts and
/// logs failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

/// A type-erased unit of work, executed exactly once by a queue worker.
pub type Job = Box<dyn FnOnce() -> JobOutcome + Send + 'static>;

/// Wrap a side-effecting closure as a job.
pub(crate) fn untyped<F>(f: F) -> Job
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || {
        f();
        JobOutcome::Succeeded
    })
}

/// Wrap a value-returning closure as a job plus the submitter's end of its
/// capacity-1 result channel.
pub(crate) fn typed<T, E, F>(id: JobId, f: F) -> (Job, Pending<T, E>)
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<Result<T, E>>(1);
    let job: Job = Box::new(move || {
        let result = f();
        let outcome = match &result {
            Ok(_) => JobOutcome::Succeeded,
            Err(err) => JobOutcome::Failed(err.to_string()),
        };
        // The submitter may have timed out and gone away; the job still ran.
        let _ = tx.send(result);
        outcome
    });
    (job, Pending { id, rx })
}

/// A job's eventual result, held by whoever submitted it.
#[derive(Debug)]
pub struct Pending<T, E> {
    id: JobId,
    rx: mpsc::Receiver<Result<T, E>>,
}

impl<T, E> Pending<T, E>
where
    E: From<DispatchError>,
{
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Block until the job has run and return its result unchanged.
    pub fn wait(self) -> Result<T, E> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(mpsc::RecvError) => Err(DispatchError::Abandoned.into()),
        }
    }

    /// Like [`Pending::wait`], but stop waiting after `timeout`.
    ///
    /// Giving up does not cancel the job: it still runs on the worker and its
    /// result is discarded.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, E> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DispatchError::TimedOut(timeout).into()),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DispatchError::Abandoned.into()),
        }
    }

    /// Non-blocking check; returns the pending handle back if not finished.
    pub fn try_wait(self) -> Result<Result<T, E>, Self> {
        match self.rx.try_recv() {
            Ok(result) => Ok(result),
            Err(mpsc::TryRecvError::Empty) => Err(self),
            Err(mpsc::TryRecvError::Disconnected) => Ok(Err(DispatchError::Abandoned.into())),
        }
    }
}
