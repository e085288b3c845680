use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::lock;

/// Counts completed tasks of one operation and elects the task that publishes the aggregate result.
#[derive(Debug)]
pub struct CompletionTracker {
    total: usize,
    done: AtomicUsize,
    finished: Mutex<bool>,
}

impl CompletionTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            finished: Mutex::new(false),
        }
    }

    /// Registers one completed task.
    /// Returns true for exactly one call: the first one observing that all tasks are done.
    pub fn complete_one(&self) -> bool {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if done < self.total {
            return false;
        }
        let mut finished = lock(&self.finished);
        match *finished {
            true => false,
            false => {
                *finished = true;
                true
            }
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
