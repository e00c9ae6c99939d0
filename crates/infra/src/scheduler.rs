//! Periodic task scheduler.
//!
//! One named thread runs every registered task in turn:
//! - each task fires once at start-up, then every `interval`
//! - tasks never overlap (themselves or each other)
//! - ticks missed while a task was running are coalesced, not replayed
//! - shutdown interrupts the idle wait immediately

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

/// Shortest accepted interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest accepted interval; longer ones are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

type TaskFn = Box<dyn FnMut() + Send>;

struct PeriodicTask {
    name: String,
    interval: Duration,
    next_due: Instant,
    run: TaskFn,
}

/// Per-task counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub name: String,
    pub runs: u64,
    /// Ticks dropped because the previous run was still going.
    pub coalesced: u64,
    pub panicked: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Builder for the scheduler thread.
pub struct Scheduler {
    name: String,
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Register `task` to run at start-up and then every `interval`.
    pub fn every<F>(mut self, name: impl Into<String>, interval: Duration, task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.tasks.push(PeriodicTask {
            name: name.into(),
            interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            next_due: Instant::now(),
            run: Box::new(task),
        });
        self
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Spawn the scheduler thread.
    pub fn start(self) -> io::Result<SchedulerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(
            self.tasks
                .iter()
                .map(|t| TaskStats {
                    name: t.name.clone(),
                    runs: 0,
                    coalesced: 0,
                    panicked: 0,
                    last_run_at: None,
                })
                .collect::<Vec<_>>(),
        ));
        let stats_clone = stats.clone();

        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || scheduler_loop(self, shutdown_rx, stats_clone))?;

        Ok(SchedulerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

/// Handle to stop and join the scheduler thread.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<Vec<TaskStats>>>,
}

impl SchedulerHandle {
    /// Stop the scheduler. A task already running finishes first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> Vec<TaskStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

fn scheduler_loop(
    mut scheduler: Scheduler,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<Vec<TaskStats>>>,
) {
    let tasks: Vec<&str> = scheduler.task_names();
    info!(scheduler = %scheduler.name, tasks = ?tasks, "scheduler started");

    'outer: loop {
        for (index, task) in scheduler.tasks.iter_mut().enumerate() {
            if shutdown_rx.try_recv().is_ok() {
                break 'outer;
            }
            if task.next_due > Instant::now() {
                continue;
            }

            debug!(task = %task.name, "running periodic task");
            let started = Utc::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (task.run)()));
            if outcome.is_err() {
                error!(task = %task.name, "periodic task panicked");
            }

            let (next, coalesced) = next_deadline(task.next_due, task.interval, Instant::now());
            task.next_due = next;
            if coalesced > 0 {
                debug!(task = %task.name, coalesced, "skipped ticks while task was running");
            }

            if let Ok(mut s) = stats.lock() {
                if let Some(entry) = s.get_mut(index) {
                    entry.runs += 1;
                    entry.coalesced += coalesced;
                    entry.panicked += u64::from(outcome.is_err());
                    entry.last_run_at = Some(started);
                }
            }
        }

        let wait = scheduler
            .tasks
            .iter()
            .map(|t| t.next_due.saturating_duration_since(Instant::now()))
            .min()
            .unwrap_or(Duration::from_secs(3600));

        match shutdown_rx.recv_timeout(wait) {
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(scheduler = %scheduler.name, "scheduler stopped");
}

/// First tick of `interval` after `due` that lies past `finished`, plus the
/// number of ticks skipped on the way.
fn next_deadline(due: Instant, interval: Duration, finished: Instant) -> (Instant, u64) {
    let far_future = |from: Instant| from.checked_add(MAX_INTERVAL).unwrap_or(from);
    let mut next = match due.checked_add(interval) {
        Some(next) => next,
        None => return (far_future(finished), 0),
    };
    let mut coalesced = 0u64;
    while next <= finished {
        next = match next.checked_add(interval) {
            Some(next) => next,
            None => return (far_future(finished), coalesced),
        };
        coalesced += 1;
    }
    (next, coalesced)
}
