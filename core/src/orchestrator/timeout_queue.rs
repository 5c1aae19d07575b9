//! Timeout scheduler: a min-heap keyed by `expires_at`.
//!
//! "A scheduler polls the heap and, for every entry whose deadline has
//! passed, posts an expiry to the owning task." [`Orchestrator::process_timeouts`]
//! is that poll; this type only holds the heap itself, with no background
//! thread of its own, matching the single-process, no-async-runtime design.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::core::ids::TaskId;

#[derive(Debug, Eq, PartialEq)]
struct Deadline {
    expires_at: i64,
    task_id: TaskId,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.expires_at
            .cmp(&other.expires_at)
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of `(expires_at, task_id)`, popped in ascending deadline order.
#[derive(Debug, Default)]
pub struct TimeoutScheduler {
    heap: Mutex<BinaryHeap<Reverse<Deadline>>>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self { heap: Mutex::new(BinaryHeap::new()) }
    }

    pub fn schedule(&self, expires_at: i64, task_id: TaskId) {
        self.heap
            .lock()
            .expect("timeout heap poisoned")
            .push(Reverse(Deadline { expires_at, task_id }));
    }

    /// Pop and return every task id whose deadline is `<= now_ms`. Entries
    /// for tasks that have already reached a terminal state via another
    /// path are still returned here; the caller's `on_timeout` is expected
    /// to be idempotent ("on wake-up the task re-checks current state").
    pub fn pop_due(&self, now_ms: i64) -> Vec<TaskId> {
        let mut heap = self.heap.lock().expect("timeout heap poisoned");
        let mut due = Vec::new();
        while let Some(Reverse(deadline)) = heap.peek() {
            if deadline.expires_at > now_ms {
                break;
            }
            let Reverse(deadline) = heap.pop().expect("peeked entry must pop");
            due.push(deadline.task_id);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("timeout heap poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
