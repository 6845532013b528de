use std::thread;
use std::time::Duration;

use rexec::dynamic::{map_value, value_sender, Value};
use rexec::{
    just, on, sync_wait, then, transfer, when_all, AnySender, InlineScheduler, Scheduler,
    SenderExt, SingleThreadContext, ThreadPool, ThreadPoolOptions, TimedSingleThreadContext,
};
use serde_json::json;

fn pool(name: &str, threads: usize) -> ThreadPool {
    ThreadPool::with_options(ThreadPoolOptions {
        threads,
        name: name.to_owned(),
    })
    .unwrap()
}

#[test]
fn then_on_just() {
    assert_eq!(sync_wait(then(just((2, 3)), |(a, b)| (a + b,))), (5,));
}

#[test]
fn when_all_over_every_kind_of_scheduler() {
    let pool = pool("mixed-pool", 2);
    let single = SingleThreadContext::new().unwrap();
    let timed = TimedSingleThreadContext::new().unwrap();

    let values = sync_wait(when_all((
        just((100,)),
        transfer(just((200,)), InlineScheduler),
        then(pool.scheduler().schedule(), |()| (300,)),
        then(single.scheduler().schedule(), |()| (400,)),
        then(timed.scheduler().schedule_after(Duration::from_millis(5)), |()| (500,)),
    )));
    assert_eq!(values, (100, 200, 300, 400, 500));
}

#[test]
fn bulk_fused_multiply_add() {
    const N: usize = 1024;
    type Buffers = (Vec<f64>, Vec<f64>, Vec<f64>);

    let pool = pool("fma", 4);
    let a: Vec<f64> = (0..N).map(|i| i as f64).collect();
    let b = vec![3.0f64; N];
    let c = vec![1.0f64; N];
    let touched = vec![0u32; N];

    let ((a, b, c), touched) = sync_wait(
        just(((a, b, c), touched))
            .transfer(pool.scheduler())
            .bulk(N, |i, ((a, b, c), touched): &mut (Buffers, Vec<u32>)| {
                c[i] = a[i].mul_add(b[i], c[i]);
                touched[i] += 1;
            }),
    );

    assert!(touched.iter().all(|&n| n == 1));
    assert_eq!((a.len(), b.len()), (N, N));
    for (i, c) in c.into_iter().enumerate() {
        assert_eq!(c, 3.0 * i as f64 + 1.0);
    }
}

#[test]
fn let_value_schedules_follow_up_work() {
    let worker = SingleThreadContext::new().unwrap();
    let scheduler = worker.scheduler();

    let (len, id) = sync_wait(just((String::from("hello"),)).let_value(move |(text,)| {
        text.push_str(" world");
        let len = text.len();
        then(scheduler.schedule(), move |()| (len, thread::current().id()))
    }));
    assert_eq!(len, 11);
    assert_eq!(id, worker.thread_id());
}

#[test]
fn on_then_transfer_back() {
    let a = SingleThreadContext::new().unwrap();
    let b = SingleThreadContext::new().unwrap();

    let ids = sync_wait(
        on(a.scheduler(), just(()).then(|()| (thread::current().id(),)))
            .transfer(b.scheduler())
            .then(|(first,)| (first, thread::current().id())),
    );
    assert_eq!(ids, (a.thread_id(), b.thread_id()));
}

#[test]
fn erased_senders_compose() {
    let pool = pool("erased", 2);
    let scheduler = pool.scheduler();
    type Stage = Box<dyn FnOnce(AnySender<(i64,)>) -> AnySender<(i64,)>>;
    let stages: Vec<Stage> = vec![
        Box::new(|s: AnySender<(i64,)>| s.then(|(n,)| (n + 1,)).boxed()),
        Box::new(|s: AnySender<(i64,)>| s.then(|(n,)| (n * 10,)).boxed()),
        Box::new(move |s: AnySender<(i64,)>| s.transfer(scheduler).boxed()),
    ];

    let sender = stages
        .into_iter()
        .fold(just((4,)).boxed(), |sender, stage| stage(sender));
    assert_eq!(sync_wait(sender), (50,));
}

#[test]
fn dynamic_values_through_a_scheduler() {
    let pool = pool("dynamic", 1);
    let worker = pool.thread_ids()[0];

    let sender = value_sender(json!({ "items": [1, 2, 3] }))
        .transfer(pool.scheduler())
        .boxed();
    let sender = map_value(sender, move |value| {
        assert_eq!(thread::current().id(), worker);
        let total: i64 = value["items"]
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_i64).sum())
            .unwrap_or_default();
        json!({ "total": total })
    });

    assert_eq!(sync_wait(sender), (json!({ "total": 6 }),));
}
