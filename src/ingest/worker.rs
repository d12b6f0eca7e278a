//! Shared worker configuration, statistics and settle outcomes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::ingest::backoff::{DEFAULT_CEILING, DEFAULT_FLOOR};

/// Default ceiling on a single remote call, including its retryless HTTP
/// round trip. A stalled remote must not wedge the whole queue.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Shortest idle wait between empty polls.
    pub poll_floor: Duration,
    /// Longest idle wait between empty polls.
    pub poll_ceiling: Duration,
    /// Hard timeout wrapped around each remote store call.
    pub task_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_floor: DEFAULT_FLOOR,
            poll_ceiling: DEFAULT_CEILING,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    /// Sets the idle-poll floor.
    pub fn with_poll_floor(mut self, floor: Duration) -> Self {
        self.poll_floor = floor;
        self
    }

    /// Sets the idle-poll ceiling.
    pub fn with_poll_ceiling(mut self, ceiling: Duration) -> Self {
        self.poll_ceiling = ceiling;
        self
    }

    /// Sets the per-task remote call timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }
}

/// How a single delivered task was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Task done, envelope completed.
    Completed,
    /// Transient failure, envelope returned to the queue.
    Requeued,
    /// Fatal failure or exhausted budget, envelope dead-lettered.
    DeadLettered,
}

/// Counters shared between a running worker and its operator surface.
#[derive(Debug, Default)]
pub struct WorkerStats {
    completed: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
}

impl WorkerStats {
    /// Creates zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a settle outcome.
    pub fn record(&self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed.fetch_add(1, Ordering::SeqCst),
            TaskOutcome::Requeued => self.requeued.fetch_add(1, Ordering::SeqCst),
            TaskOutcome::DeadLettered => self.dead_lettered.fetch_add(1, Ordering::SeqCst),
        };
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            completed: self.completed.load(Ordering::SeqCst),
            requeued: self.requeued.load(Ordering::SeqCst),
            dead_lettered: self.dead_lettered.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of a worker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSnapshot {
    /// Tasks settled successfully.
    pub completed: u64,
    /// Tasks returned to the queue for another attempt.
    pub requeued: u64,
    /// Tasks moved to the dead letter list.
    pub dead_lettered: u64,
}

impl WorkerSnapshot {
    /// Total deliveries settled.
    pub fn total(&self) -> u64 {
        self.completed + self.requeued + self.dead_lettered
    }
}
