use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::queue::TaskQueue;
use crate::task::Task;

// Worker-local context: the worker's own queue and the "execute next" slot
// a completing task may fill with a ready successor.
thread_local! {
    static WORKER_QUEUE: RefCell<Option<Arc<TaskQueue>>> = const { RefCell::new(None) };
    static NEXT_TASK: RefCell<Option<Arc<Task>>> = const { RefCell::new(None) };
}

pub(crate) fn is_worker_thread() -> bool {
    WORKER_QUEUE.with(|queue| queue.borrow().is_some())
}

/// Hand a ready successor to the current worker. The worker runs it before
/// pulling from any queue; a second successor falls back to the queue.
pub(crate) fn execute_next(task: Arc<Task>) {
    // Claim the task; if it already sits in a queue, leave it there.
    if !task.try_mark_enqueued() {
        return;
    }
    NEXT_TASK.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(task);
        } else {
            WORKER_QUEUE.with(|queue| {
                queue
                    .borrow()
                    .as_ref()
                    .expect("execute_next outside a worker thread")
                    .push_claimed(task);
            });
        }
    });
}

fn take_next() -> Option<Arc<Task>> {
    // Slot tasks were claimed as `Enqueued`; assign them like a queue pull.
    NEXT_TASK
        .with(|slot| slot.borrow_mut().take())
        .filter(|task| task.try_mark_assigned_to_worker())
}

const IDLE_WAIT: Duration = Duration::from_millis(10);

/// Main loop of one worker thread.
///
/// Sources, in order: the next-task slot, the worker's own queue, stealing
/// from the other queues. An idle worker parks on its queue with a timeout
/// so shutdown and stolen-from queues are re-checked.
pub(crate) fn worker_loop(
    worker_id: usize,
    queues: Vec<Arc<TaskQueue>>,
    shutdown: Arc<AtomicBool>,
) {
    WORKER_QUEUE.with(|slot| *slot.borrow_mut() = Some(queues[worker_id].clone()));

    let own = queues[worker_id].clone();
    loop {
        let task = take_next().or_else(|| own.pull()).or_else(|| steal(&queues, worker_id));

        match task {
            Some(task) => task.execute(),
            None => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                own.wait_for_work(IDLE_WAIT);
            }
        }
    }
}

fn steal(queues: &[Arc<TaskQueue>], worker_id: usize) -> Option<Arc<Task>> {
    let count = queues.len();
    for offset in 1..count {
        let victim = (worker_id + offset) % count;
        if let Some(task) = queues[victim].steal() {
            return Some(task);
        }
    }
    None
}
