use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::task::Task;

/// FIFO queue of ready tasks owned by one worker.
///
/// Tasks enter in `Enqueued` state (the push claims them) and leave in
/// `AssignedToWorker` state. Stealing skips tasks pinned to their queue.
pub(crate) struct TaskQueue {
    deque: Mutex<VecDeque<Arc<Task>>>,
    ready: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> TaskQueue {
        TaskQueue { deque: Mutex::new(VecDeque::new()), ready: Condvar::new() }
    }

    /// Claim the task for this queue and append it. A task that some other
    /// path already enqueued is left alone.
    pub(crate) fn push(&self, task: Arc<Task>) {
        if !task.try_mark_enqueued() {
            return;
        }
        self.push_claimed(task);
    }

    /// Append a task already claimed (marked `Enqueued`) by the caller
    pub(crate) fn push_claimed(&self, task: Arc<Task>) {
        self.deque.lock().push_back(task);
        self.ready.notify_one();
    }

    /// Pop the oldest task and assign it to the calling worker
    pub(crate) fn pull(&self) -> Option<Arc<Task>> {
        let mut deque = self.deque.lock();
        while let Some(task) = deque.pop_front() {
            if task.try_mark_assigned_to_worker() {
                return Some(task);
            }
        }
        None
    }

    /// Remove the oldest stealable task on behalf of another worker
    pub(crate) fn steal(&self) -> Option<Arc<Task>> {
        let mut deque = self.deque.lock();
        while let Some(index) = deque.iter().position(|task| task.is_stealable()) {
            let task = deque.remove(index).expect("position() returned a valid index");
            if task.try_mark_assigned_to_worker() {
                return Some(task);
            }
        }
        None
    }

    /// Park until work may be available or the timeout elapses
    pub(crate) fn wait_for_work(&self, timeout: Duration) {
        let mut deque = self.deque.lock();
        if deque.is_empty() {
            self.ready.wait_for(&mut deque, timeout);
        }
    }

    /// Wake anyone parked on this queue (used on shutdown)
    pub(crate) fn notify_all(&self) {
        self.ready.notify_all();
    }
}
