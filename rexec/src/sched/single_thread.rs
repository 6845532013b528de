use std::fmt;
use std::thread::{JoinHandle, ThreadId};

use super::run_loop::{RunLoop, RunLoopScheduler};
use super::{join_worker, spawn_worker};
use crate::Result;

/// Options for [`SingleThreadContext`].
#[derive(Debug, Clone)]
pub struct SingleThreadOptions {
    /// The name given to the context's thread.
    pub name: String,
}

impl Default for SingleThreadOptions {
    fn default() -> Self {
        Self {
            name: "rexec-single".to_owned(),
        }
    }
}

/// One thread driving one [`RunLoop`].
///
/// Dropping the context finishes the loop, lets it drain, and joins the
/// thread. A panic on the thread is propagated to the dropping thread.
pub struct SingleThreadContext {
    run_loop: RunLoop,
    thread_id: ThreadId,
    thread: Option<JoinHandle<()>>,
}

impl SingleThreadContext {
    pub fn new() -> Result<Self> {
        Self::with_options(SingleThreadOptions::default())
    }

    pub fn with_options(options: SingleThreadOptions) -> Result<Self> {
        let run_loop = RunLoop::new();
        let worker = run_loop.clone();
        let thread = spawn_worker(options.name.clone(), move || worker.run())?;
        log::debug!("started single thread context '{}'", options.name);

        Ok(Self {
            run_loop,
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    pub fn scheduler(&self) -> RunLoopScheduler {
        self.run_loop.scheduler()
    }

    /// The id of the thread running the context's work.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl fmt::Debug for SingleThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleThreadContext")
            .field("thread_id", &self.thread_id)
            .field("run_loop", &self.run_loop)
            .finish()
    }
}

impl Drop for SingleThreadContext {
    fn drop(&mut self) {
        self.run_loop.finish();
        if let Some(thread) = self.thread.take() {
            join_worker(thread);
        }
        log::debug!("stopped single thread context");
    }
}
