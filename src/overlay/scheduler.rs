//! One-shot deferred tasks on the engine clock
//!
//! Tasks fire in due-time order; ties fire in scheduling order. Cancelled
//! tasks are dropped lazily when they reach the head of the queue.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Handle returned by `schedule_at`, used for cancellation
pub type TimerId = u64;

pub struct Scheduler<T> {
    queue: BinaryHeap<Reverse<(u64, TimerId)>>,
    tasks: HashMap<TimerId, T>,
    next_id: TimerId,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Schedule `task` to fire once the clock reaches `due_ms`
    pub fn schedule_at(&mut self, due_ms: u64, task: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse((due_ms, id)));
        self.tasks.insert(id, task);
        id
    }

    /// Cancel a pending task. Returns the task if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.tasks.remove(&id)
    }

    /// Due time of the earliest live task
    pub fn next_due(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse((due, _))| *due)
    }

    /// Pop the earliest task whose due time is `<= now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, T)> {
        let due = self.next_due()?;
        if due > now_ms {
            return None;
        }
        let Reverse((_, id)) = self.queue.pop()?;
        self.tasks.remove(&id).map(|task| (id, task))
    }

    /// Mutable access to every pending task
    pub fn pending_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.tasks.values_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, id))) = self.queue.peek() {
            if self.tasks.contains_key(id) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
