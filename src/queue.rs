//! A wait-free multi-producer / blocking single-consumer queue (spec.md
//! §4.6), used as a reclamation conduit but equally usable standalone.
//!
//! `enqueue` never blocks and never retries: every producer completes in a
//! bounded number of steps regardless of what other producers are doing.
//! `dequeue_blocking` is serialized by an internal mutex and may spin/sleep
//! waiting for a concurrently in-flight enqueue to finish linking its node
//! in.

use std::mem::MaybeUninit;
use std::ptr;
use std::time::Duration;

// Mirrors the teacher's own `#[cfg(loom)] use loom::sync::{...}` /
// `#[cfg(not(loom))] use std::sync::{...}` split: under `cfg(loom)`,
// `tests/loom.rs` model-checks this queue's atomics and mutex directly, so
// they must be loom's shadow types rather than the real ones.
#[cfg(loom)]
use loom::sync::{
    atomic::{AtomicPtr, Ordering},
    Mutex,
};
#[cfg(not(loom))]
use std::sync::{
    atomic::{AtomicPtr, Ordering},
    Mutex,
};

use crate::ordering::{load_acquire, xchg};

/// Spin attempts before falling back to sleeping while waiting for an
/// in-flight enqueue to publish its node (spec.md §4.6).
const WFQ_ADAPT_ATTEMPTS: u32 = 10;
const WFQ_ADAPT_SLEEP: Duration = Duration::from_millis(10);

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: MaybeUninit<T>,
}

impl<T> Node<T> {
    fn new_dummy() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::uninit(),
        }))
    }

    fn new_value(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::new(value),
        }))
    }
}

/// A wait-free MPSC / blocking SC queue with an inline dummy node.
///
/// `head` is consumer-owned (only ever touched under `consumer_lock`).
/// `tail` always addresses the `next` field slot that the next `enqueue`
/// will publish into (spec.md §3's queue invariants).
pub struct Queue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<AtomicPtr<Node<T>>>,
    consumer_lock: Mutex<()>,
    dummy: *mut Node<T>,
}

// SAFETY: all cross-thread access to `head`/`tail`/node contents goes
// through the atomics above or is serialized by `consumer_lock`.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    /// Creates a new, empty queue.
    pub fn new() -> Self {
        let dummy = Node::<T>::new_dummy();
        let dummy_next = unsafe { &raw mut (*dummy).next };
        Queue {
            head: AtomicPtr::new(dummy),
            tail: AtomicPtr::new(dummy_next),
            consumer_lock: Mutex::new(()),
            dummy,
        }
    }

    /// Wait-free: publishes `value` so a future `dequeue_blocking` will
    /// return it. Safe to call from any number of threads concurrently.
    ///
    /// Between the `xchg` below and the following store, the queue is
    /// transiently in a state where `tail` has advanced but the node it
    /// points at is not yet linked from `head` — this is exactly the
    /// "enqueue in flight" state `dequeue_blocking`'s wait loop tolerates
    /// (spec.md §4.6).
    pub fn enqueue(&self, value: T) {
        let node = Node::new_value(value);
        let node_next_slot = unsafe { &raw mut (*node).next };
        let prev_slot = xchg(&self.tail, node_next_slot);
        // SAFETY: `prev_slot` was the `next` field of some node still
        // reachable from `head` (either the dummy, installed at
        // construction, or a previously enqueued node) — nothing ever
        // frees a node's `next` field out from under a pending producer,
        // since a node is only freed by the consumer after it is unlinked
        // by advancing `head` past it, and a producer that raced ahead and
        // captured this `prev_slot` via `xchg` above "owns" publishing into
        // it.
        unsafe { (*prev_slot).store(node, Ordering::Release) };
    }

    /// Blocking: returns the oldest enqueued value not yet returned, or
    /// `None` if the queue was observably empty at the moment this was
    /// called. Concurrent callers are excluded by an internal mutex — this
    /// queue supports only a single logical consumer at a time (spec.md
    /// §4.6 Non-goal: multi-consumer concurrent dequeue).
    pub fn dequeue_blocking(&self) -> Option<T> {
        let _guard = self.consumer_lock.lock().unwrap();
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let head_next_slot = unsafe { &raw mut (*head).next } as *mut AtomicPtr<Node<T>>;
            if head == self.dummy && self.tail.load(Ordering::Acquire) == head_next_slot {
                return None;
            }

            let next = wait_for_next(unsafe { &(*head).next });
            self.head.store(next, Ordering::Relaxed);

            if head == self.dummy {
                // The dummy carries no value; re-publish it at the tail and
                // retry with the now-advanced head.
                self.requeue_dummy();
                continue;
            }

            // SAFETY: `head` just got unlinked from the live chain (no
            // other consumer can reach it, `consumer_lock` excludes other
            // dequeuers, and producers never revisit a node once linked),
            // and its value was written by `enqueue` before it became
            // reachable.
            let value = unsafe { (*head).value.assume_init_read() };
            drop(unsafe { Box::from_raw(head) });
            return Some(value);
        }
    }

    fn requeue_dummy(&self) {
        unsafe { (*self.dummy).next.store(ptr::null_mut(), Ordering::Relaxed) };
        let dummy_next_slot = unsafe { &raw mut (*self.dummy).next };
        let prev_slot = xchg(&self.tail, dummy_next_slot);
        unsafe { (*prev_slot).store(self.dummy, Ordering::Release) };
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // No concurrent producers/consumers can exist once we have `&mut
        // self`; walk and free whatever remains of the chain, dropping any
        // still-enqueued values (but not the dummy's uninitialized slot).
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            let next = node.next.load(Ordering::Relaxed);
            if !ptr::eq(current, self.dummy) {
                unsafe { node.value.assume_init_read() };
            }
            current = next;
        }
    }
}

/// Waits for `node.next` to become non-null: spins up to
/// `WFQ_ADAPT_ATTEMPTS` times with a CPU-relax hint, then sleeps in
/// `WFQ_ADAPT_SLEEP` increments (spec.md §4.6's adaptive back-off). Never
/// returns null.
fn wait_for_next<T>(next: &AtomicPtr<Node<T>>) -> *mut Node<T> {
    let mut spins = 0;
    loop {
        let p = load_acquire(next);
        if !p.is_null() {
            return p;
        }
        if spins < WFQ_ADAPT_ATTEMPTS {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::sleep(WFQ_ADAPT_SLEEP);
        }
    }
}
