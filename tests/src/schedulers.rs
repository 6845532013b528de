use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use assert_matches2::assert_matches;
use rexec::sched::registry;
use rexec::{
    just, schedule_from, sync_wait, then, when_all, AnyScheduler, Error, Scheduler, SenderExt,
    SingleThreadContext, ThreadPool, ThreadPoolOptions, TimedSingleThreadContext,
};

#[test]
fn schedule_from_completes_on_the_target() {
    let worker = SingleThreadContext::new().unwrap();
    let (id,) = sync_wait(then(schedule_from(worker.scheduler(), just(())), |()| {
        (thread::current().id(),)
    }));
    assert_eq!(id, worker.thread_id());
    assert_ne!(id, thread::current().id());
}

#[test]
fn schedule_after_waits() {
    let timed = TimedSingleThreadContext::new().unwrap();
    let start = Instant::now();
    let (id,) = sync_wait(
        timed
            .scheduler()
            .schedule_after(Duration::from_millis(50))
            .then(|()| (thread::current().id(),)),
    );
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(id, timed.thread_id());
}

#[test]
fn timers_fire_in_deadline_order() {
    let timed = TimedSingleThreadContext::new().unwrap();
    let scheduler = timed.scheduler();
    let order = Arc::new(Mutex::new(Vec::new()));

    let record = |label: &'static str, millis: u64| {
        let order = order.clone();
        scheduler
            .schedule_after(Duration::from_millis(millis))
            .then(move |()| order.lock().unwrap().push(label))
    };
    let now = Instant::now();
    sync_wait(when_all((
        record("late", 40),
        record("early", 10),
        scheduler
            .schedule_at(now + Duration::from_millis(25))
            .then({
                let order = order.clone();
                move |()| order.lock().unwrap().push("middle")
            }),
    )));

    assert_eq!(*order.lock().unwrap(), ["early", "middle", "late"]);
}

#[test]
fn thread_pool_runs_on_its_workers() {
    let pool = ThreadPool::with_options(ThreadPoolOptions {
        threads: 4,
        name: String::from("workers"),
    })
    .unwrap();
    assert_eq!(pool.threads(), 4);

    let on_worker = |scheduler: rexec::RunLoopScheduler| {
        scheduler.schedule().then(|()| {
            thread::sleep(Duration::from_millis(5));
            let current = thread::current();
            (current.id(), current.name().map(str::to_owned))
        })
    };
    let (a, an, b, bn, c, cn, d, dn) = sync_wait(when_all((
        on_worker(pool.scheduler()),
        on_worker(pool.scheduler()),
        on_worker(pool.scheduler()),
        on_worker(pool.scheduler()),
    )));

    let ids = pool.thread_ids();
    for (id, name) in [(a, an), (b, bn), (c, cn), (d, dn)] {
        assert!(ids.contains(&id));
        assert_matches!(name, Some(name));
        assert!(name.starts_with("workers-"));
    }
}

#[test]
fn thread_pool_rejects_zero_threads() {
    let result = ThreadPool::with_options(ThreadPoolOptions {
        threads: 0,
        ..Default::default()
    });
    assert_matches!(result, Err(Error::InvalidOptions(_)));
}

#[test]
fn registry_builtins() {
    let inline = registry::get(registry::INLINE).unwrap();
    let pool = registry::get(registry::THREAD_POOL).unwrap();
    let single = registry::get(registry::SINGLE_THREAD).unwrap();

    assert_eq!(pool, registry::get(registry::THREAD_POOL).unwrap());
    assert_ne!(inline, pool);
    assert_ne!(pool, single);

    let values = sync_wait(when_all((
        just((1,)).transfer(inline),
        just((2,)).transfer(pool),
        just((3,)).transfer(single),
    )));
    assert_eq!(values, (1, 2, 3));
}

#[test]
fn registry_custom_and_unknown() {
    let worker = SingleThreadContext::new().unwrap();
    let name = "integration-custom";

    assert!(registry::register(name, AnyScheduler::new(worker.scheduler())).is_none());
    let scheduler = registry::get(name).unwrap();
    assert_eq!(scheduler, AnyScheduler::new(worker.scheduler()));

    let (id,) = sync_wait(scheduler.schedule().then(|()| (thread::current().id(),)));
    assert_eq!(id, worker.thread_id());

    assert!(registry::unregister(name).is_some());
    assert_matches!(registry::get(name), Err(Error::UnknownScheduler(missing)));
    assert_eq!(missing, name);
}
