//! Adaptive idle-poll backoff for the queue workers.

use std::time::Duration;

/// Default shortest idle wait.
pub const DEFAULT_FLOOR: Duration = Duration::from_secs(5);

/// Default longest idle wait.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(60);

/// Growing idle-poll interval used by a worker when its queue is empty.
///
/// Consecutive empty polls double the wait, starting at the floor and
/// saturating at the ceiling. Any successful pop resets the interval to
/// the floor, so a draining worker polls at full speed.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl PollBackoff {
    /// Creates a backoff with the given bounds.
    ///
    /// The ceiling is raised to the floor if the bounds are inverted.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Returns the wait for this idle round and doubles the next one.
    pub fn next_idle(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        wait
    }

    /// Resets the interval to the floor after a non-empty poll.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    /// The wait the next idle round would use.
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOR, DEFAULT_CEILING)
    }
}
