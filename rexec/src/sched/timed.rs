use std::cell::UnsafeCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::single_thread::SingleThreadOptions;
use super::{join_worker, spawn_worker};
use crate::util::task_queue::Task;
use crate::{OperationState, Receiver, Result, Scheduler, Sender};

struct TaskRef(NonNull<Task>);

unsafe impl Send for TaskRef {}

struct Entry {
    deadline: Instant,
    /// Submission order, breaks ties between equal deadlines.
    seq: u64,
    task: TaskRef,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed, the heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    timers: BinaryHeap<Entry>,
    next_seq: u64,
    finishing: bool,
}

struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

impl Shared {
    fn push(&self, deadline: Instant, task: NonNull<Task>) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.timers.push(Entry {
            deadline,
            seq,
            task: TaskRef(task),
        });
        drop(state);
        self.ready.notify_one();
    }

    fn run(&self) {
        let mut state = self.state.lock();
        loop {
            match state.timers.peek().map(|entry| entry.deadline) {
                Some(deadline) if deadline <= Instant::now() => {
                    if let Some(entry) = state.timers.pop() {
                        // SAFETY: the entry was popped, its operation is alive
                        // until the task completes it.
                        MutexGuard::unlocked(&mut state, || unsafe { Task::execute(entry.task.0) });
                    }
                }
                Some(deadline) => {
                    self.ready.wait_until(&mut state, deadline);
                }
                None if state.finishing => return,
                None => self.ready.wait(&mut state),
            }
        }
    }

    fn finish(&self) {
        self.state.lock().finishing = true;
        self.ready.notify_all();
    }
}

/// One thread running work at requested points in time.
///
/// Timers with equal deadlines run in submission order. Dropping the context
/// waits for every submitted timer to fire, then joins the thread. A timer
/// whose deadline overflows `Instant` never fires.
pub struct TimedSingleThreadContext {
    shared: Arc<Shared>,
    thread_id: ThreadId,
    thread: Option<JoinHandle<()>>,
}

impl TimedSingleThreadContext {
    pub fn new() -> Result<Self> {
        Self::with_options(SingleThreadOptions {
            name: "rexec-timer".to_owned(),
        })
    }

    pub fn with_options(options: SingleThreadOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                timers: BinaryHeap::new(),
                next_seq: 0,
                finishing: false,
            }),
            ready: Condvar::new(),
        });
        let worker = shared.clone();
        let thread = spawn_worker(options.name.clone(), move || worker.run())?;
        log::debug!("started timed context '{}'", options.name);

        Ok(Self {
            shared,
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    pub fn scheduler(&self) -> TimedScheduler {
        TimedScheduler {
            shared: self.shared.clone(),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl fmt::Debug for TimedSingleThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedSingleThreadContext")
            .field("thread_id", &self.thread_id)
            .field("timers", &self.shared.state.lock().timers.len())
            .finish()
    }
}

impl Drop for TimedSingleThreadContext {
    fn drop(&mut self) {
        self.shared.finish();
        if let Some(thread) = self.thread.take() {
            join_worker(thread);
        }
        log::debug!("stopped timed context");
    }
}

/// Schedules work onto a [`TimedSingleThreadContext`], now or at a deadline.
#[derive(Clone)]
pub struct TimedScheduler {
    shared: Arc<Shared>,
}

impl TimedScheduler {
    /// Completes on the timer thread no earlier than `duration` after the
    /// operation is started. Durations too large to add to the current time
    /// never complete.
    pub fn schedule_after(&self, duration: Duration) -> TimedSender {
        TimedSender {
            shared: self.shared.clone(),
            deadline: Deadline::After(duration),
        }
    }

    /// Completes on the timer thread no earlier than `instant`.
    pub fn schedule_at(&self, instant: Instant) -> TimedSender {
        TimedSender {
            shared: self.shared.clone(),
            deadline: Deadline::At(instant),
        }
    }
}

impl PartialEq for TimedScheduler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for TimedScheduler {}

impl fmt::Debug for TimedScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TimedScheduler")
            .field(&Arc::as_ptr(&self.shared))
            .finish()
    }
}

impl Scheduler for TimedScheduler {
    type Sender = TimedSender;

    fn schedule(&self) -> TimedSender {
        self.schedule_after(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy)]
enum Deadline {
    At(Instant),
    After(Duration),
}

impl Deadline {
    /// `None` when the deadline lies beyond what `Instant` can represent.
    fn resolve(self) -> Option<Instant> {
        match self {
            Deadline::At(instant) => Some(instant),
            Deadline::After(duration) => Instant::now().checked_add(duration),
        }
    }
}

#[must_use = "senders do nothing unless connected and started"]
pub struct TimedSender {
    shared: Arc<Shared>,
    deadline: Deadline,
}

impl Sender for TimedSender {
    type Output = ();
    type Operation<R: Receiver<()>> = TimedOperation<R>;

    fn connect<R: Receiver<()>>(self, receiver: R) -> TimedOperation<R> {
        TimedOperation {
            task: Task::new(TimedOperation::<R>::execute),
            receiver: UnsafeCell::new(Some(receiver)),
            shared: self.shared,
            deadline: self.deadline,
            started: false,
        }
    }
}

#[repr(C)]
pub struct TimedOperation<R> {
    task: Task,
    receiver: UnsafeCell<Option<R>>,
    shared: Arc<Shared>,
    deadline: Deadline,
    started: bool,
}

unsafe impl<R: Send> Send for TimedOperation<R> {}

impl<R: Receiver<()>> TimedOperation<R> {
    unsafe fn execute(task: NonNull<Task>) {
        let this = task.cast::<Self>().as_ptr();
        let receiver = unsafe { (*(*this).receiver.get()).take() };
        receiver.expect("timer has no receiver").set_value(());
    }
}

impl<R: Receiver<()>> OperationState for TimedOperation<R> {
    unsafe fn start(self: Pin<&mut Self>) {
        let this = unsafe { self.get_unchecked_mut() };
        assert!(!mem::replace(&mut this.started, true), "operation started twice");

        let Some(deadline) = this.deadline.resolve() else {
            log::debug!("timer deadline {:?} is unreachable, it will never fire", this.deadline);
            return;
        };
        let shared = this.shared.clone();
        shared.push(deadline, NonNull::from(this).cast());
    }
}
