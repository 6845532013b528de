use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rexec::{
    ensure_started, just, split, start_detached, sync_wait, then, when_all, Scheduler, SenderExt,
    SingleThreadContext, ThreadPool,
};

use crate::recv_within;

#[test]
fn split_consumers_before_and_after_completion() {
    let worker = SingleThreadContext::new().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    let shared = split(then(worker.scheduler().schedule(), move |()| {
        counter.fetch_add(1, Ordering::Relaxed);
        thread::sleep(Duration::from_millis(10));
        (vec![1, 2, 3],)
    }));

    let early = sync_wait(when_all((shared.clone(), shared.clone(), shared.clone())));
    assert_eq!(early, (vec![1, 2, 3], vec![1, 2, 3], vec![1, 2, 3]));

    for _ in 0..3 {
        assert_eq!(sync_wait(shared.clone()), (vec![1, 2, 3],));
    }
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn split_consumers_on_many_threads() {
    let pool = ThreadPool::new().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    let shared = split(then(pool.scheduler().schedule(), move |()| {
        counter.fetch_add(1, Ordering::Relaxed);
        (String::from("shared"),)
    }));

    let consumers: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || sync_wait(shared).0)
        })
        .collect();
    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), "shared");
    }
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn ensure_started_runs_without_a_consumer() {
    let worker = SingleThreadContext::new().unwrap();
    let (tx, rx) = mpsc::channel();

    let eager = ensure_started(then(worker.scheduler().schedule(), move |()| {
        tx.send(()).unwrap();
        (7,)
    }));
    recv_within(&rx, 5);

    assert_eq!(sync_wait(eager), (7,));
}

#[test]
fn ensure_started_runs_exactly_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    let eager = just(()).then(move |()| (counter.fetch_add(1, Ordering::Relaxed),)).ensure_started();
    assert_eq!(runs.load(Ordering::Relaxed), 1);

    assert_eq!(sync_wait(eager), (0,));
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn start_detached_on_a_pool() {
    let pool = ThreadPool::new().unwrap();
    let (tx, rx) = mpsc::channel();

    for i in 0..16 {
        let tx = tx.clone();
        start_detached(then(pool.scheduler().schedule(), move |()| tx.send(i).unwrap()));
    }

    let mut seen: Vec<i32> = (0..16).map(|_| recv_within(&rx, 5)).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..16).collect::<Vec<_>>());
}
