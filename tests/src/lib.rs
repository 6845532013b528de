#![cfg(test)]

mod capi;
mod pipelines;
mod schedulers;
mod sharing;

use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Waits for a signal from detached work, failing instead of hanging.
fn recv_within<T>(rx: &Receiver<T>, secs: u64) -> T {
    rx.recv_timeout(Duration::from_secs(secs))
        .expect("timed out waiting for detached work")
}
