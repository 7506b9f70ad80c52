//! Wait-free MPSC / blocking SC queue scenarios from spec.md §8.

use gprcu::Queue;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Scenario 5: N producers each enqueue M distinct values; the single
/// consumer dequeues N*M values whose multiset equals the union of the
/// producers' inputs, and each producer's values come out in its own
/// enqueue order.
#[test]
fn mpsc_many_producers() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 500;

    let queue = Arc::new(Queue::new());
    let mut handles = Vec::with_capacity(PRODUCERS);
    for p in 0..PRODUCERS {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                // Encode (producer, sequence) so we can check per-producer
                // ordering below.
                q.enqueue((p, i));
            }
        }));
    }

    let mut last_seen: HashMap<usize, i64> = HashMap::new();
    let mut received = 0usize;
    while received < PRODUCERS * PER_PRODUCER {
        if let Some((p, i)) = queue.dequeue_blocking() {
            let last = last_seen.entry(p).or_insert(-1);
            assert!(i as i64 > *last, "producer {p} out of order: {i} after {last}");
            *last = i as i64;
            received += 1;
        }
    }

    for h in handles {
        h.join().unwrap();
    }
    for p in 0..PRODUCERS {
        assert_eq!(last_seen[&p], PER_PRODUCER as i64 - 1);
    }
}

/// Scenario 6: dequeuing an empty queue returns `None`; enqueuing afterward
/// makes the next dequeue return that node.
#[test]
fn empty_then_enqueue() {
    let queue: Queue<i32> = Queue::new();
    assert_eq!(queue.dequeue_blocking(), None);
    queue.enqueue(42);
    assert_eq!(queue.dequeue_blocking(), Some(42));
    assert_eq!(queue.dequeue_blocking(), None);
}

#[test]
fn fifo_single_producer() {
    let queue = Queue::new();
    for i in 0..1000 {
        queue.enqueue(i);
    }
    for i in 0..1000 {
        assert_eq!(queue.dequeue_blocking(), Some(i));
    }
    assert_eq!(queue.dequeue_blocking(), None);
}
