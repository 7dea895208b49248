use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::queue::TaskQueue;
use crate::task::Task;
use crate::worker;

/// A pool of worker threads, one queue per worker.
///
/// Ready tasks are placed on the queue named by their node affinity hint,
/// or round-robin otherwise. Idle workers steal from other queues. The pool
/// is passed explicitly to whoever schedules tasks; there is no process
/// global.
pub struct Scheduler {
    queues: Vec<Arc<TaskQueue>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    next_queue: AtomicUsize,
}

impl Scheduler {
    /// Spawn `worker_count` workers. Use
    /// `std::thread::available_parallelism` via `default_worker_count` when
    /// the caller has no better knowledge.
    pub fn new(worker_count: usize) -> Arc<Scheduler> {
        assert!(worker_count > 0, "scheduler needs at least one worker");

        let queues: Vec<Arc<TaskQueue>> =
            (0..worker_count).map(|_| Arc::new(TaskQueue::new())).collect();
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let queues = queues.clone();
                let shutdown = shutdown.clone();
                std::thread::Builder::new()
                    .name(format!("granite-worker-{}", worker_id))
                    .spawn(move || worker::worker_loop(worker_id, queues, shutdown))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Arc::new(Scheduler {
            queues,
            workers: Mutex::new(workers),
            shutdown,
            next_queue: AtomicUsize::new(0),
        })
    }

    /// One worker per hardware thread
    pub fn default_worker_count() -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    /// Place a ready task on a queue
    pub(crate) fn enqueue(&self, task: Arc<Task>) {
        let queue = match task.node_hint() {
            Some(node) => node % self.queues.len(),
            None => self.next_queue.fetch_add(1, Ordering::Relaxed) % self.queues.len(),
        };
        self.queues[queue].push(task);
    }

    /// Stop accepting work and join all workers. Queued tasks already
    /// claimed by workers finish; this is called with no tasks in flight.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for queue in &self.queues {
            queue.notify_all();
        }
        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
