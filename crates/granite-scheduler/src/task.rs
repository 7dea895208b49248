use std::sync::atomic::{fence, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::scheduler::Scheduler;
use crate::worker;

/// Process-wide unique task id
pub type TaskId = u64;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// Lifecycle of a task.
///
/// Legal transitions:
///
/// ```text
/// Created -> Scheduled -> Enqueued -> AssignedToWorker -> Started -> Done
///                    \______________________________________/
///                     (inline execution without a scheduler)
/// ```
///
/// Re-entering `Enqueued` or `AssignedToWorker` reports "already there"
/// without error; every other illegal transition is a programming error and
/// panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskState {
    Created = 0,
    Scheduled = 1,
    Enqueued = 2,
    AssignedToWorker = 3,
    Started = 4,
    Done = 5,
}

impl TaskState {
    fn from_u8(value: u8) -> TaskState {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Scheduled,
            2 => TaskState::Enqueued,
            3 => TaskState::AssignedToWorker,
            4 => TaskState::Started,
            5 => TaskState::Done,
            _ => unreachable!("invalid task state {}", value),
        }
    }
}

type Action = Box<dyn FnOnce() + Send + 'static>;

/// A schedulable unit of work with predecessor/successor dependencies.
///
/// Dependency edges must be set before scheduling. A task whose
/// predecessors are incomplete defers execution until the last predecessor
/// completes; completion then either enqueues it, hands it to the current
/// worker as its next task, or (without a scheduler) executes it inline.
pub struct Task {
    id: TaskId,
    description: String,
    action: Mutex<Option<Action>>,
    state: AtomicU8,
    pending_predecessors: AtomicUsize,
    successors: Mutex<Vec<Arc<Task>>>,
    node_hint: Option<usize>,
    stealable: bool,
    done: Mutex<bool>,
    done_condvar: Condvar,
    done_callback: Mutex<Option<Action>>,
    // Captured at schedule time; consulted when the task becomes ready off
    // the worker path.
    scheduler: Mutex<Option<Arc<Scheduler>>>,
    // Self-handle for enqueuing and worker chaining
    weak_self: Weak<Task>,
}

impl Task {
    pub fn new(description: impl Into<String>, action: impl FnOnce() + Send + 'static) -> Arc<Task> {
        Task::with_options(description, None, true, action)
    }

    /// Create a task with a node affinity hint and/or pinned to its queue
    /// (`stealable = false`).
    pub fn with_options(
        description: impl Into<String>,
        node_hint: Option<usize>,
        stealable: bool,
        action: impl FnOnce() + Send + 'static,
    ) -> Arc<Task> {
        let description = description.into();
        Arc::new_cyclic(|weak_self| Task {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            description,
            action: Mutex::new(Some(Box::new(action))),
            state: AtomicU8::new(TaskState::Created as u8),
            pending_predecessors: AtomicUsize::new(0),
            successors: Mutex::new(Vec::new()),
            node_hint,
            stealable,
            done: Mutex::new(false),
            done_condvar: Condvar::new(),
            done_callback: Mutex::new(None),
            scheduler: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    fn arc(&self) -> Arc<Task> {
        self.weak_self.upgrade().expect("task outlived its Arc")
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.pending_predecessors.load(Ordering::SeqCst) == 0
    }

    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }

    pub fn is_stealable(&self) -> bool {
        self.stealable
    }

    pub fn is_scheduled(&self) -> bool {
        self.state() >= TaskState::Scheduled
    }

    pub(crate) fn node_hint(&self) -> Option<usize> {
        self.node_hint
    }

    /// Make `self` a predecessor of `successor`.
    ///
    /// Setting edges after scheduling races with completion bookkeeping and
    /// is rejected.
    pub fn set_as_predecessor_of(&self, successor: &Arc<Task>) {
        assert!(
            !self.is_scheduled() && !successor.is_scheduled(),
            "don't set task dependencies after scheduling"
        );
        successor.pending_predecessors.fetch_add(1, Ordering::SeqCst);
        self.successors.lock().push(successor.clone());
    }

    /// Callback fired on completion, after successors are notified
    pub fn set_done_callback(&self, callback: impl FnOnce() + Send + 'static) {
        assert!(!self.is_scheduled(), "don't set the done callback after scheduling");
        *self.done_callback.lock() = Some(Box::new(callback));
    }

    /// Mark the task as scheduled and hand it to the scheduler.
    ///
    /// Without a scheduler the task executes inline once ready: immediately
    /// if its predecessors are done, otherwise on the thread that completes
    /// the last predecessor.
    pub fn schedule(&self, scheduler: Option<&Arc<Scheduler>>) {
        // Writes by this thread must be visible to the executing worker; a
        // matching fence sits at the top of `execute`.
        fence(Ordering::SeqCst);

        let scheduled = self.transition(TaskState::Created, TaskState::Scheduled);
        assert!(scheduled, "task {} was already scheduled", self.id);

        match scheduler {
            Some(scheduler) => {
                *self.scheduler.lock() = Some(scheduler.clone());
                if self.is_ready() {
                    scheduler.enqueue(self.arc());
                }
            }
            None => {
                if self.is_ready() {
                    self.execute();
                }
            }
        }
    }

    /// Run the task body and propagate completion.
    pub(crate) fn execute(&self) {
        let started = self.transition(TaskState::Scheduled, TaskState::Started)
            || self.transition(TaskState::AssignedToWorker, TaskState::Started);
        assert!(started, "task {} must be scheduled before it is executed", self.id);

        trace!("task start: id={} description={:?} at={:p}", self.id, self.description, self as *const Task);
        debug_assert!(self.is_ready(), "task {} executed before its predecessors finished", self.id);

        // See the fence in `schedule`.
        fence(Ordering::SeqCst);

        let action = self.action.lock().take().expect("task action already taken");
        action();

        let finished = self.transition(TaskState::Started, TaskState::Done);
        assert!(finished, "task {} finished from an illegal state", self.id);

        let successors = self.successors.lock().clone();
        for successor in &successors {
            successor.on_predecessor_done();
        }

        if let Some(callback) = self.done_callback.lock().take() {
            callback();
        }

        {
            let mut done = self.done.lock();
            *done = true;
        }
        self.done_condvar.notify_all();

        trace!("task end: id={} at={:p}", self.id, self as *const Task);
    }

    /// Block until this task is done
    pub fn join(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.done_condvar.wait(&mut done);
        }
    }

    /// One predecessor finished; run or enqueue once the last one does.
    fn on_predecessor_done(&self) {
        let remaining = self.pending_predecessors.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining != 0 {
            return;
        }

        if worker::is_worker_thread() {
            // A successor may become ready before being scheduled; leave it
            // for `schedule` in that case.
            if !self.is_scheduled() {
                return;
            }
            // Prefer running the successor on this worker next, for cache
            // locality and to skip the queue round-trip.
            worker::execute_next(self.arc());
        } else if self.is_scheduled() {
            let scheduler = self.scheduler.lock().clone();
            match scheduler {
                Some(scheduler) => scheduler.enqueue(self.arc()),
                None => self.execute(),
            }
        }
        // Otherwise the task runs once it is scheduled.
    }

    /// Claim the task for a queue. Returns false if some other path already
    /// enqueued it.
    pub(crate) fn try_mark_enqueued(&self) -> bool {
        self.transition(TaskState::Scheduled, TaskState::Enqueued)
    }

    /// Claim the task for execution on a worker. Returns false if another
    /// worker already claimed it.
    pub(crate) fn try_mark_assigned_to_worker(&self) -> bool {
        self.transition(TaskState::Enqueued, TaskState::AssignedToWorker)
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        let result = self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        match result {
            Ok(_) => true,
            Err(actual) => {
                let actual = TaskState::from_u8(actual);
                match to {
                    // Re-entry reports "already there"; competing claims
                    // during the ready/scheduled race resolve to exactly
                    // one winner and the loser backs off. Callers assert
                    // where losing is illegal.
                    TaskState::Scheduled
                    | TaskState::Enqueued
                    | TaskState::AssignedToWorker
                    | TaskState::Started => false,
                    _ => panic!(
                        "illegal task state transition: {:?} -> {:?} (task {})",
                        actual, to, self.id
                    ),
                }
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_execution_without_scheduler() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let task = Task::new("inline", move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });
        task.schedule(None);
        assert!(task.is_done());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_schedule_order_with_dependencies() {
        // task3 is scheduled first but must wait for task1 and task2.
        let order = Arc::new(Mutex::new(Vec::new()));

        let make = |name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>| {
            let order = order.clone();
            Task::new(name, move || order.lock().push(name))
        };
        let task1 = make("task1", &order);
        let task2 = make("task2", &order);
        let task3 = make("task3", &order);
        task1.set_as_predecessor_of(&task2);
        task2.set_as_predecessor_of(&task3);

        task3.schedule(None);
        assert!(!task3.is_done());

        task1.schedule(None);
        assert!(task1.is_done());
        // task2 became ready but is not yet scheduled, so it must not run.
        assert!(!task2.is_done());

        task2.schedule(None);
        assert!(task2.is_done());
        assert!(task3.is_done());
        assert_eq!(*order.lock(), vec!["task1", "task2", "task3"]);
    }

    #[test]
    fn test_done_callback_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let task = Task::new("noop", || {});
        let hits_clone = hits.clone();
        task.set_done_callback(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        task.schedule(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "already scheduled")]
    fn test_double_schedule_panics() {
        let task = Task::new("once", || {});
        task.schedule(None);
        task.schedule(None);
    }

    #[test]
    #[should_panic(expected = "don't set task dependencies")]
    fn test_edges_after_scheduling_panic() {
        let task1 = Task::new("a", || {});
        let task2 = Task::new("b", || {});
        task1.schedule(None);
        task1.set_as_predecessor_of(&task2);
    }

    #[test]
    fn test_state_machine_observed_states() {
        let task = Task::new("states", || {});
        assert_eq!(task.state(), TaskState::Created);
        task.schedule(None);
        assert_eq!(task.state(), TaskState::Done);
        assert!(task.is_scheduled());
    }
}
