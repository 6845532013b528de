//! A process-wide table of named schedulers.
//!
//! `"inline"` is always present, and comes back after being unregistered.
//! `"thread_pool"` and `"single_thread"` are built the first time they're
//! looked up and live for the rest of the process. Anything else must be
//! [`register`]ed first.

use hashbrown::HashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use super::{InlineScheduler, SingleThreadContext, ThreadPool};
use crate::{AnyScheduler, Error, Result};

pub const INLINE: &str = "inline";
pub const THREAD_POOL: &str = "thread_pool";
pub const SINGLE_THREAD: &str = "single_thread";

static REGISTRY: Lazy<Mutex<HashMap<String, AnyScheduler>>> = Lazy::new(|| {
    let mut schedulers = HashMap::new();
    schedulers.insert(INLINE.to_owned(), AnyScheduler::new(InlineScheduler));
    Mutex::new(schedulers)
});

static POOL: OnceCell<ThreadPool> = OnceCell::new();
static SINGLE: OnceCell<SingleThreadContext> = OnceCell::new();

/// Registers `scheduler` under `name`, returning the scheduler it replaced.
pub fn register(name: impl Into<String>, scheduler: AnyScheduler) -> Option<AnyScheduler> {
    let name = name.into();
    let replaced = REGISTRY.lock().insert(name.clone(), scheduler);
    if replaced.is_some() {
        log::warn!("replaced scheduler '{name}'");
    }
    replaced
}

/// Looks up the scheduler named `name`, building it first if it's a built-in.
pub fn get(name: &str) -> Result<AnyScheduler> {
    if let Some(scheduler) = REGISTRY.lock().get(name) {
        return Ok(scheduler.clone());
    }

    let scheduler = match name {
        INLINE => AnyScheduler::new(InlineScheduler),
        THREAD_POOL => {
            let pool = POOL.get_or_try_init(|| {
                log::debug!("building built-in scheduler '{THREAD_POOL}'");
                ThreadPool::new()
            })?;
            AnyScheduler::new(pool.scheduler())
        }
        SINGLE_THREAD => {
            let context = SINGLE.get_or_try_init(|| {
                log::debug!("building built-in scheduler '{SINGLE_THREAD}'");
                SingleThreadContext::new()
            })?;
            AnyScheduler::new(context.scheduler())
        }
        _ => return Err(Error::UnknownScheduler(name.to_owned())),
    };

    // Someone may have registered the name while the lock was released.
    let mut registry = REGISTRY.lock();
    Ok(registry.entry(name.to_owned()).or_insert(scheduler).clone())
}

/// Removes the scheduler named `name`. Built-ins are rebuilt on their next
/// lookup, sharing their original context.
pub fn unregister(name: &str) -> Option<AnyScheduler> {
    REGISTRY.lock().remove(name)
}
