//! Execution contexts and their schedulers.

mod inline;
pub mod registry;
mod run_loop;
mod single_thread;
mod thread_pool;
mod timed;

use std::panic::resume_unwind;
use std::thread::{self, JoinHandle};

use crate::{Error, Result};

pub use inline::InlineScheduler;
pub use run_loop::{RunLoop, RunLoopOperation, RunLoopScheduler, RunLoopSender};
pub use single_thread::{SingleThreadContext, SingleThreadOptions};
pub use thread_pool::{ThreadPool, ThreadPoolOptions};
pub use timed::{TimedOperation, TimedScheduler, TimedSender, TimedSingleThreadContext};

/// Spawns a named thread running `body`.
fn spawn_worker<F>(name: String, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.clone();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            log::trace!("worker '{thread_name}' starting");
            scopeguard::defer! {
                log::trace!("worker '{thread_name}' exiting");
            }
            body();
        })
        .map_err(|source| Error::Spawn { name, source })
}

/// Waits for a worker to exit and propagates its panic, unless this thread is
/// already unwinding.
fn join_worker(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
    if let Err(payload) = handle.join() {
        log::warn!("worker '{name}' panicked");
        if !thread::panicking() {
            resume_unwind(payload);
        }
    }
}
