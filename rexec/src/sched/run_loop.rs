use std::cell::UnsafeCell;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::util::task_queue::{Task, TaskQueue};
use crate::{OperationState, Receiver, Scheduler, Sender};

struct State {
    tasks: TaskQueue,
    finishing: bool,
}

struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

impl Shared {
    fn push_back(&self, task: NonNull<Task>) {
        let mut state = self.state.lock();
        // SAFETY: tasks are embedded in pinned operation states that stay alive
        // until they run.
        unsafe { state.tasks.push_back(task) };
        drop(state);
        self.ready.notify_one();
    }

    fn pop_front(&self) -> Option<NonNull<Task>> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.finishing {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }
}

/// A FIFO queue of work that one or more threads drive with [`RunLoop::run`].
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct RunLoop {
    shared: Arc<Shared>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    tasks: TaskQueue::new(),
                    finishing: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Returns a scheduler that enqueues work on this loop.
    pub fn scheduler(&self) -> RunLoopScheduler {
        RunLoopScheduler {
            shared: self.shared.clone(),
        }
    }

    /// Runs queued work until the loop is finished and the queue is empty.
    ///
    /// Blocks while the queue is empty and the loop isn't finished.
    pub fn run(&self) {
        while let Some(task) = self.shared.pop_front() {
            // SAFETY: the task was popped, so this thread has exclusive access
            // to it, and its operation state is alive until it completes.
            unsafe { Task::execute(task) }
        }
    }

    /// Makes [`run`](Self::run) return once the queue drains.
    pub fn finish(&self) {
        self.shared.state.lock().finishing = true;
        self.shared.ready.notify_all();
    }

    /// The number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RunLoop")
            .field("pending", &state.tasks.len())
            .field("finishing", &state.finishing)
            .finish()
    }
}

/// Schedules work onto a [`RunLoop`].
#[derive(Clone)]
pub struct RunLoopScheduler {
    shared: Arc<Shared>,
}

impl PartialEq for RunLoopScheduler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for RunLoopScheduler {}

impl fmt::Debug for RunLoopScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RunLoopScheduler")
            .field(&Arc::as_ptr(&self.shared))
            .finish()
    }
}

impl Scheduler for RunLoopScheduler {
    type Sender = RunLoopSender;

    fn schedule(&self) -> RunLoopSender {
        RunLoopSender {
            shared: self.shared.clone(),
        }
    }
}

/// Completes with no values from the thread running the loop.
#[must_use = "senders do nothing unless connected and started"]
pub struct RunLoopSender {
    shared: Arc<Shared>,
}

impl Sender for RunLoopSender {
    type Output = ();
    type Operation<R: Receiver<()>> = RunLoopOperation<R>;

    fn connect<R: Receiver<()>>(self, receiver: R) -> RunLoopOperation<R> {
        RunLoopOperation {
            task: Task::new(RunLoopOperation::<R>::execute),
            receiver: UnsafeCell::new(Some(receiver)),
            shared: self.shared,
            started: false,
        }
    }
}

#[repr(C)]
pub struct RunLoopOperation<R> {
    task: Task,
    receiver: UnsafeCell<Option<R>>,
    shared: Arc<Shared>,
    started: bool,
}

unsafe impl<R: Send> Send for RunLoopOperation<R> {}

impl<R: Receiver<()>> RunLoopOperation<R> {
    unsafe fn execute(task: NonNull<Task>) {
        let this = task.cast::<Self>().as_ptr();
        let receiver = unsafe { (*(*this).receiver.get()).take() };
        receiver.expect("run loop task has no receiver").set_value(());
    }
}

impl<R: Receiver<()>> OperationState for RunLoopOperation<R> {
    unsafe fn start(self: Pin<&mut Self>) {
        let this = unsafe { self.get_unchecked_mut() };
        assert!(!mem::replace(&mut this.started, true), "operation started twice");

        // The task can run and free the operation before `push_back` returns.
        let shared = this.shared.clone();
        shared.push_back(NonNull::from(this).cast());
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::RunLoop;
    use crate::{sync_wait, then, Scheduler};

    #[test]
    fn finish_drains_queued_work() {
        let run_loop = RunLoop::new();
        let worker = run_loop.clone();
        let handle = thread::spawn(move || worker.run());

        let scheduler = run_loop.scheduler();
        let id = sync_wait(then(scheduler.schedule(), |()| (thread::current().id(),)));
        assert_eq!(id.0, handle.thread().id());

        run_loop.finish();
        handle.join().unwrap();
        assert_eq!(run_loop.pending(), 0);
    }

    #[test]
    fn run_returns_when_finished_empty() {
        let run_loop = RunLoop::new();
        run_loop.finish();
        run_loop.run();
    }

    #[test]
    fn schedulers_compare_by_loop() {
        let a = RunLoop::new();
        let b = RunLoop::new();
        assert_eq!(a.scheduler(), a.clone().scheduler());
        assert_ne!(a.scheduler(), b.scheduler());
    }
}
