//! An intrusive FIFO of tasks.
//!
//! Tasks live inside operation states, so scheduling work never allocates. A
//! queued task must stay pinned and alive until it's popped again.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomPinned;
use std::ptr::NonNull;

/// A unit of queued work embedded in an operation state.
///
/// Operation states embed the task as their first field in a `#[repr(C)]`
/// layout, so `execute` can recover the operation from the task pointer.
#[repr(C)]
pub(crate) struct Task {
    /// Only touched by the queue holding the task.
    next: UnsafeCell<Option<NonNull<Task>>>,
    execute: unsafe fn(NonNull<Task>),
    _pinned: PhantomPinned,
}

unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    pub const fn new(execute: unsafe fn(NonNull<Task>)) -> Self {
        Self {
            next: UnsafeCell::new(None),
            execute,
            _pinned: PhantomPinned,
        }
    }

    /// # Safety
    ///
    /// The task must be live and not queued anywhere.
    pub unsafe fn execute(this: NonNull<Task>) {
        unsafe {
            let execute = this.as_ref().execute;
            execute(this)
        }
    }
}

/// Tasks in submission order.
///
/// Dropping a non-empty queue forgets the remaining tasks, their operations
/// never complete.
pub(crate) struct TaskQueue {
    head: Option<NonNull<Task>>,
    tail: Option<NonNull<Task>>,
    len: usize,
}

unsafe impl Send for TaskQueue {}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// # Safety
    ///
    /// The task must stay pinned and alive until it's popped, and must not be
    /// in any other queue.
    pub unsafe fn push_back(&mut self, task: NonNull<Task>) {
        assert_ne!(self.tail, Some(task), "task is already queued");

        unsafe {
            *task.as_ref().next.get() = None;
            match self.tail {
                Some(tail) => *tail.as_ref().next.get() = Some(task),
                None => self.head = Some(task),
            }
        }

        self.tail = Some(task);
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<NonNull<Task>> {
        let head = self.head?;
        // SAFETY: queued tasks are alive until popped.
        self.head = unsafe { (*head.as_ref().next.get()).take() };
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::pin::Pin;
    use std::ptr::NonNull;

    use super::{Task, TaskQueue};

    thread_local! {
        static RAN: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
    }

    #[repr(C)]
    struct Job {
        task: Task,
        val: i32,
    }

    unsafe fn run(task: NonNull<Task>) {
        let val = unsafe { task.cast::<Job>().as_ref().val };
        RAN.with(|ran| ran.borrow_mut().push(val));
    }

    fn job(val: i32) -> Pin<Box<Job>> {
        Box::pin(Job {
            task: Task::new(run),
            val,
        })
    }

    fn ptr(job: &Pin<Box<Job>>) -> NonNull<Task> {
        NonNull::from(&**job).cast()
    }

    fn drain(queue: &mut TaskQueue) -> Vec<i32> {
        while let Some(task) = queue.pop_front() {
            unsafe { Task::execute(task) };
        }
        RAN.with(|ran| ran.take())
    }

    #[test]
    fn runs_in_push_order() {
        let (a, b, c) = (job(5), job(7), job(31));
        let mut queue = TaskQueue::new();
        unsafe {
            queue.push_back(ptr(&a));
            queue.push_back(ptr(&b));
            queue.push_back(ptr(&c));
        }
        assert_eq!(queue.len(), 3);

        assert_eq!(drain(&mut queue), [5, 7, 31]);
        assert_eq!(queue.len(), 0);
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn reuse_after_draining() {
        let (a, b) = (job(1), job(2));
        let mut queue = TaskQueue::new();
        unsafe { queue.push_back(ptr(&a)) };
        assert_eq!(queue.pop_front(), Some(ptr(&a)));
        assert!(queue.pop_front().is_none());

        unsafe {
            queue.push_back(ptr(&b));
            queue.push_back(ptr(&a));
        }
        assert_eq!(drain(&mut queue), [2, 1]);
    }

    #[test]
    fn interleaved_push_and_pop() {
        let (a, b, c) = (job(1), job(2), job(3));
        let mut queue = TaskQueue::new();
        unsafe {
            queue.push_back(ptr(&a));
            queue.push_back(ptr(&b));
        }
        assert_eq!(queue.pop_front(), Some(ptr(&a)));
        unsafe { queue.push_back(ptr(&c)) };
        assert_eq!(drain(&mut queue), [2, 3]);
    }

    #[test]
    #[should_panic = "task is already queued"]
    fn double_push_of_tail_panics() {
        let a = job(1);
        let mut queue = TaskQueue::new();
        unsafe {
            queue.push_back(ptr(&a));
            queue.push_back(ptr(&a));
        }
    }
}
