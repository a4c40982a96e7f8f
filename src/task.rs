//! The unit of work that the mesh balances.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A single unit of simulated work.
///
/// Immutable after construction. A task is shared as `Arc<Task>`: it may
/// traverse the queues of several nodes while being offloaded, but it is
/// executed by exactly one worker, exactly once.
///
/// `created_at` is a local monotonic instant for latency analysis; it is
/// not wire state and is re-stamped on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: u64,
    cost_ms: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl Task {
    /// Create a task with a run-unique id and a simulated cost in
    /// milliseconds.
    pub fn new(id: u64, cost_ms: u64) -> Self {
        Self {
            id,
            cost_ms,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Upper bound on the simulated execution duration.
    pub fn cost(&self) -> Duration {
        Duration::from_millis(self.cost_ms)
    }

    /// Instant this task was constructed (queueing delay = now - created_at).
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Simulate execution by sleeping for the task's cost.
    ///
    /// The sleep cedes the scheduler, so a worker mid-execute does not pin
    /// a runtime thread. Total: no error path.
    pub async fn execute(&self) {
        tokio::time::sleep(self.cost()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let task = Task::new(7, 150);
        assert_eq!(task.id(), 7);
        assert_eq!(task.cost(), Duration::from_millis(150));
        assert!(task.created_at().elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn execute_sleeps_for_cost() {
        let task = Task::new(0, 250);
        let before = tokio::time::Instant::now();
        task.execute().await;
        assert_eq!(before.elapsed(), Duration::from_millis(250));
    }
}
