use std::fmt;
use std::num::NonZeroUsize;
use std::thread::{self, JoinHandle, ThreadId};

use super::run_loop::{RunLoop, RunLoopScheduler};
use super::{join_worker, spawn_worker};
use crate::{Error, Result};

/// Options for [`ThreadPool`].
#[derive(Debug, Clone)]
pub struct ThreadPoolOptions {
    /// The number of worker threads. Must not be zero.
    pub threads: usize,
    /// The prefix of the workers' names. Workers are named `{name}-{index}`.
    pub name: String,
}

impl Default for ThreadPoolOptions {
    fn default() -> Self {
        Self {
            threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            name: "rexec-pool".to_owned(),
        }
    }
}

/// A fixed set of threads all driving one shared [`RunLoop`].
///
/// Work is taken in submission order by whichever worker is free. Dropping
/// the pool finishes the loop, lets it drain, and joins every worker.
pub struct ThreadPool {
    run_loop: RunLoop,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new() -> Result<Self> {
        Self::with_options(ThreadPoolOptions::default())
    }

    pub fn with_options(options: ThreadPoolOptions) -> Result<Self> {
        if options.threads == 0 {
            return Err(Error::InvalidOptions("a thread pool needs at least one thread"));
        }

        // Workers that already started are joined by `Drop` if a later spawn fails.
        let mut pool = Self {
            run_loop: RunLoop::new(),
            workers: Vec::with_capacity(options.threads),
        };
        for index in 0..options.threads {
            let worker = pool.run_loop.clone();
            let name = format!("{}-{index}", options.name);
            pool.workers.push(spawn_worker(name, move || worker.run())?);
        }

        log::debug!(
            "started thread pool '{}' with {} threads",
            options.name,
            options.threads
        );
        Ok(pool)
    }

    pub fn scheduler(&self) -> RunLoopScheduler {
        self.run_loop.scheduler()
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// The ids of the pool's workers.
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.workers.iter().map(|w| w.thread().id()).collect()
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.workers.len())
            .field("run_loop", &self.run_loop)
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.run_loop.finish();
        for worker in self.workers.drain(..) {
            join_worker(worker);
        }
        log::debug!("stopped thread pool");
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::{ThreadPool, ThreadPoolOptions};
    use crate::Error;

    #[test]
    fn zero_threads_is_rejected() {
        let result = ThreadPool::with_options(ThreadPoolOptions {
            threads: 0,
            ..Default::default()
        });
        assert_matches!(result, Err(Error::InvalidOptions(_)));
    }

    #[test]
    fn spawns_requested_workers() {
        let pool = ThreadPool::with_options(ThreadPoolOptions {
            threads: 3,
            name: "pool-test".to_owned(),
        })
        .unwrap();
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.thread_ids().len(), 3);
    }
}
