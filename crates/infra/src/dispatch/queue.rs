//! The per-platform queue and its worker thread.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use super::job::{self, Job, JobId, JobOutcome, Pending};
use super::DispatchError;

/// Default buffer capacity of a dispatch queue.
pub const QUEUE_SIZE: usize = 1000;

/// Pause inserted by the worker after every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub enabled: bool,
    #[serde(with = "duration_ms")]
    pub interval: Duration,
}

impl RateLimit {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval: Duration::ZERO,
        }
    }

    /// Pause `interval` after each job.
    ///
    /// The pause starts when the job returns, so the spacing between two
    /// calls is the job's duration plus `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            enabled: true,
            interval,
        }
    }

    fn pause(&self) -> Option<Duration> {
        (self.enabled && !self.interval.is_zero()).then_some(self.interval)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Dispatch queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Worker thread name, also used in logs
    pub name: String,
    /// Number of jobs that may wait before submitters block
    pub capacity: usize,
    pub rate_limit: RateLimit,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "dispatch".to_string(),
            capacity: QUEUE_SIZE,
            rate_limit: RateLimit::disabled(),
        }
    }
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

enum Command {
    Run {
        id: JobId,
        job: Job,
        enqueued_at: Instant,
    },
    Stop,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Jobs sitting in the buffer, not yet picked up
    pub queued: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl DispatchStats {
    pub fn executed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

/// Submission side of a dispatch queue.
///
/// Cheap to clone; every clone feeds the same buffer and worker.
#[derive(Clone)]
pub struct DispatchQueue {
    name: Arc<str>,
    tx: mpsc::SyncSender<Command>,
    counters: Arc<Counters>,
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Owner of a queue's worker thread.
#[derive(Debug)]
pub struct QueueHandle {
    name: Arc<str>,
    tx: mpsc::SyncSender<Command>,
    join: Option<thread::JoinHandle<()>>,
}

impl QueueHandle {
    /// Stop the worker once every job submitted so far has run, and wait for
    /// it to exit.
    ///
    /// Jobs submitted after this call are abandoned.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Command::Stop);
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                error!(queue = %self.name, "dispatch worker thread panicked");
            }
        }
    }
}

impl DispatchQueue {
    /// Create the buffer and start its single worker thread.
    pub fn start(config: QueueConfig) -> io::Result<(Self, QueueHandle)> {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::sync_channel::<Command>(capacity);
        let name: Arc<str> = Arc::from(config.name.as_str());
        let counters = Arc::new(Counters::default());

        let worker_name = name.clone();
        let worker_counters = counters.clone();
        let rate_limit = config.rate_limit;
        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(worker_name, rx, rate_limit, capacity, worker_counters))?;

        let queue = Self {
            name: name.clone(),
            tx: tx.clone(),
            counters,
        };
        let handle = QueueHandle {
            name,
            tx,
            join: Some(join),
        };
        Ok((queue, handle))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Run `f` on the worker and return its result verbatim.
    ///
    /// Blocks while the buffer is full, then until the job has run.
    pub fn submit<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DispatchError> + fmt::Display + Send + 'static,
    {
        self.enqueue(f)?.wait()
    }

    /// Like [`DispatchQueue::submit`], but stop waiting for the result after
    /// `timeout`. Waiting for buffer space is not bounded.
    pub fn submit_timeout<T, E, F>(&self, timeout: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DispatchError> + fmt::Display + Send + 'static,
    {
        self.enqueue(f)?.wait_timeout(timeout)
    }

    /// Put `f` in the buffer and return without waiting for it to run.
    ///
    /// Still blocks while the buffer is full.
    pub fn enqueue<T, E, F>(&self, f: F) -> Result<Pending<T, E>, DispatchError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let id = JobId::new();
        let (job, pending) = job::typed(id, f);
        self.push(id, job)?;
        Ok(pending)
    }

    /// Run a side-effecting closure on the worker, blocking until it ran.
    pub fn execute<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit::<(), DispatchError, _>(move || {
            f();
            Ok(())
        })
    }

    /// Fire-and-forget variant of [`DispatchQueue::execute`].
    pub fn spawn<F>(&self, f: F) -> Result<JobId, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = JobId::new();
        self.push(id, job::untyped(f))?;
        Ok(id)
    }

    fn push(&self, id: JobId, job: Job) -> Result<(), DispatchError> {
        // Count before sending so the worker never decrements below zero.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        let command = Command::Run {
            id,
            job,
            enqueued_at: Instant::now(),
        };
        if self.tx.send(command).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(DispatchError::Abandoned);
        }
        trace!(queue = %self.name, job_id = %id, "job enqueued");
        Ok(())
    }
}

fn worker_loop(
    name: Arc<str>,
    rx: mpsc::Receiver<Command>,
    rate_limit: RateLimit,
    capacity: usize,
    counters: Arc<Counters>,
) {
    info!(
        queue = %name,
        capacity,
        rate_limited = rate_limit.enabled,
        interval_ms = rate_limit.interval.as_millis() as u64,
        "dispatch worker started"
    );

    for command in rx.iter() {
        let (id, job, enqueued_at) = match command {
            Command::Run {
                id,
                job,
                enqueued_at,
            } => (id, job, enqueued_at),
            Command::Stop => break,
        };
        counters.queued.fetch_sub(1, Ordering::Relaxed);
        let waited_ms = enqueued_at.elapsed().as_millis() as u64;

        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(JobOutcome::Succeeded) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                trace!(queue = %name, job_id = %id, waited_ms, "job completed");
            }
            Ok(JobOutcome::Failed(err)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(queue = %name, job_id = %id, waited_ms, error = %err, "job returned an error");
            }
            Err(_) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(queue = %name, job_id = %id, "job panicked, continuing with next job");
            }
        }

        if let Some(pause) = rate_limit.pause() {
            thread::sleep(pause);
        }
    }

    info!(queue = %name, "dispatch worker stopped");
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum CallError {
        Api(String),
        Dispatch(DispatchError),
    }

    impl fmt::Display for CallError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CallError::Api(msg) => write!(f, "api: {msg}"),
                CallError::Dispatch(err) => write!(f, "{err}"),
            }
        }
    }

    impl From<DispatchError> for CallError {
        fn from(value: DispatchError) -> Self {
            CallError::Dispatch(value)
        }
    }

    fn start(capacity: usize, rate_limit: RateLimit) -> (DispatchQueue, QueueHandle) {
        DispatchQueue::start(
            QueueConfig::default()
                .with_name("test-dispatch")
                .with_capacity(capacity)
                .with_rate_limit(rate_limit),
        )
        .unwrap()
    }

    /// Blocks the worker until the returned sender is dropped or signalled.
    fn occupy_worker(queue: &DispatchQueue) -> mpsc::Sender<()> {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        queue
            .spawn(move || {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        release_tx
    }

    #[test]
    fn submit_returns_value_to_waiting_thread() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());

        let q = queue.clone();
        let waiter = thread::spawn(move || q.submit::<_, CallError, _>(|| Ok(42)));

        assert_eq!(waiter.join().unwrap(), Ok(42));
        handle.shutdown();
    }

    #[test]
    fn job_errors_are_returned_verbatim_and_worker_survives() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());

        let err = queue.submit::<(), _, _>(|| Err(CallError::Api("Bad Request".to_string())));
        assert_eq!(err, Err(CallError::Api("Bad Request".to_string())));

        let ok = queue.submit::<_, CallError, _>(|| Ok("still running"));
        assert_eq!(ok, Ok("still running"));

        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        handle.shutdown();
    }

    #[test]
    fn panicking_job_is_abandoned_and_worker_continues() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());

        let res = queue.submit::<u8, CallError, _>(|| panic!("job blew up"));
        assert_eq!(res, Err(CallError::Dispatch(DispatchError::Abandoned)));

        assert_eq!(queue.submit::<_, CallError, _>(|| Ok(7u8)), Ok(7));
        assert_eq!(queue.stats().panicked, 1);
        handle.shutdown();
    }

    #[test]
    fn concurrent_submissions_run_in_fifo_order_without_overlap() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());
        let release = occupy_worker(&queue);

        let log = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut pendings = Vec::new();

        // Enqueue from one thread so the submission order is known.
        for i in 0..50 {
            let log = log.clone();
            let in_flight = in_flight.clone();
            let pending = queue
                .enqueue::<_, CallError, _>(move || {
                    assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0, "jobs overlapped");
                    log.lock().unwrap().push(i);
                    thread::sleep(Duration::from_millis(1));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
                .unwrap();
            pendings.push(pending);
        }
        drop(release);

        // Wait from many threads at once.
        let waiters: Vec<_> = pendings
            .into_iter()
            .map(|p| thread::spawn(move || p.wait()))
            .collect();
        for (i, w) in waiters.into_iter().enumerate() {
            assert_eq!(w.join().unwrap(), Ok(i));
        }

        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
        handle.shutdown();
    }

    #[test]
    fn full_buffer_blocks_the_next_submission() {
        let capacity = 2;
        let (queue, handle) = start(capacity, RateLimit::disabled());
        let release = occupy_worker(&queue);

        // Up to `capacity` jobs fit without blocking.
        let mut pendings = Vec::new();
        for i in 0..capacity {
            pendings.push(queue.enqueue::<_, CallError, _>(move || Ok(i)).unwrap());
        }
        assert_eq!(queue.stats().queued, capacity);

        let (done_tx, done_rx) = mpsc::channel();
        let q = queue.clone();
        let blocked = thread::spawn(move || {
            let res = q.submit::<_, CallError, _>(|| Ok(99usize));
            let _ = done_tx.send(());
            res
        });

        assert!(
            done_rx.recv_timeout(Duration::from_millis(150)).is_err(),
            "submission beyond capacity must block"
        );

        drop(release);
        assert_eq!(blocked.join().unwrap(), Ok(99));
        for (i, p) in pendings.into_iter().enumerate() {
            assert_eq!(p.wait(), Ok(i));
        }
        handle.shutdown();
    }

    #[test]
    fn rate_limit_spaces_consecutive_jobs() {
        let interval = Duration::from_millis(40);
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::every(interval));

        let first = queue.submit::<_, CallError, _>(|| Ok(Instant::now())).unwrap();
        let second = queue.submit::<_, CallError, _>(|| Ok(Instant::now())).unwrap();

        assert!(second.duration_since(first) >= interval);
        handle.shutdown();
    }

    #[test]
    fn submit_timeout_gives_up_but_job_still_runs() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());
        let ran = Arc::new(AtomicUsize::new(0));

        let r = ran.clone();
        let res = queue.submit_timeout::<(), CallError, _>(Duration::from_millis(10), move || {
            thread::sleep(Duration::from_millis(100));
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(
            res,
            Err(CallError::Dispatch(DispatchError::TimedOut(Duration::from_millis(10))))
        );

        // FIFO: once this returns, the timed-out job has finished too.
        queue.execute(|| {}).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        handle.shutdown();
    }

    #[test]
    fn shutdown_drains_pending_jobs_then_rejects_new_ones() {
        let (queue, handle) = start(QUEUE_SIZE, RateLimit::disabled());
        let release = occupy_worker(&queue);

        let pending = queue.enqueue::<_, CallError, _>(|| Ok("drained")).unwrap();
        let stopper = thread::spawn(move || handle.shutdown());
        drop(release);
        stopper.join().unwrap();

        assert_eq!(pending.wait(), Ok("drained"));
        assert_eq!(
            queue.submit::<u8, CallError, _>(|| Ok(1)),
            Err(CallError::Dispatch(DispatchError::Abandoned))
        );
    }

    #[test]
    fn rate_limit_round_trips_as_milliseconds() {
        let json = serde_json::to_value(RateLimit::every(Duration::from_millis(1500))).unwrap();
        assert_eq!(json, serde_json::json!({ "enabled": true, "interval": 1500 }));
    }
}
