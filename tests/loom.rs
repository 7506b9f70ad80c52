//! Loom model checking, scoped to the wait-free queue.
//!
//! The RCU core's global registry, `OnceLock`, and (under `signal-mb`)
//! `libc` signal delivery are not things loom can model; per SPEC_FULL.md
//! §2/§9 this crate's loom coverage is intentionally limited to
//! `gprcu::Queue`, whose entire implementation is loom-compatible atomics
//! plus a `std::sync::Mutex`.
#![cfg(loom)]

use gprcu::Queue;
use loom::thread;

#[test]
fn loom_mpsc_two_producers() {
    loom::model(|| {
        let queue = loom::sync::Arc::new(Queue::new());

        let q1 = queue.clone();
        let t1 = thread::spawn(move || {
            q1.enqueue(1);
            q1.enqueue(2);
        });

        let q2 = queue.clone();
        let t2 = thread::spawn(move || {
            q2.enqueue(10);
            q2.enqueue(20);
        });

        t1.join().unwrap();
        t2.join().unwrap();

        let mut got = Vec::new();
        while let Some(v) = queue.dequeue_blocking() {
            got.push(v);
        }
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 10, 20]);
    });
}

#[test]
fn loom_empty_transition() {
    loom::model(|| {
        let queue = loom::sync::Arc::new(Queue::new());
        assert_eq!(queue.dequeue_blocking(), None);

        let q = queue.clone();
        let producer = thread::spawn(move || {
            q.enqueue(7);
        });

        producer.join().unwrap();
        assert_eq!(queue.dequeue_blocking(), Some(7));
    });
}
