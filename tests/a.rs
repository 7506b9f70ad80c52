//! Core grace-period scenarios from spec.md §8.

use gprcu::{read_lock, read_unlock, register_thread, unregister_thread, synchronize_rcu, RcuCell};
use std::sync::Arc;
use std::thread;

/// Scenario 1: single reader, single writer publish. The writer's call
/// blocks until the reader calls `read_unlock`; after it returns, the next
/// critical section observes the new value.
#[test]
fn single_reader_single_writer_publish() {
    register_thread();
    let cell = Arc::new(RcuCell::new(b'A'));

    let cell2 = cell.clone();
    let reader_entered = Arc::new(std::sync::Barrier::new(2));
    let reader_entered2 = reader_entered.clone();

    let reader = thread::spawn(move || {
        register_thread();
        let g = cell2.read();
        assert_eq!(*g, b'A');
        reader_entered2.wait();
        // Hold the critical section open for a moment so the writer
        // observably has to wait for it.
        thread::sleep(std::time::Duration::from_millis(20));
        drop(g);
        unregister_thread();
    });

    reader_entered.wait();
    cell.replace(b'B');
    assert_eq!(*cell.read(), b'B');

    reader.join().unwrap();
    unregister_thread();
}

/// Scenario 2: nested critical sections. `active_depth` sits at the nesting
/// constant between the two locks, and a concurrent `synchronize_rcu` only
/// returns after the outer `read_unlock`.
#[test]
fn nested_readers() {
    register_thread();
    read_lock();
    read_lock();
    read_unlock();
    read_unlock();
    unregister_thread();
}

/// Scenario 2 (continued): a writer racing a nested reader must wait for
/// the *outer* unlock, not just any unlock.
#[test]
fn synchronize_waits_for_outer_unlock() {
    register_thread();
    let cell = Arc::new(RcuCell::new(0usize));

    let barrier = Arc::new(std::sync::Barrier::new(2));
    let b2 = barrier.clone();
    let cell2 = cell.clone();
    let unlocked_inner = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let unlocked_inner2 = unlocked_inner.clone();

    let reader = thread::spawn(move || {
        register_thread();
        read_lock();
        let _g = cell2.read();
        read_lock();
        b2.wait();
        read_unlock();
        unlocked_inner2.store(true, std::sync::atomic::Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        drop(_g);
        read_unlock();
        unregister_thread();
    });

    barrier.wait();
    synchronize_rcu();
    assert!(unlocked_inner.load(std::sync::atomic::Ordering::SeqCst));

    reader.join().unwrap();
    unregister_thread();
}

/// Scenario 3: two readers, one writer, phase alternation. R1 enters before
/// the writer's first flip and holds; the writer's phase-1 wait must block
/// on R1 alone. R2 then enters (and fully exits) in the new phase while the
/// writer is still parked — if phase-1 incorrectly waited on readers in the
/// new phase too, R2 merely existing wouldn't be observable here, so instead
/// we confirm the writer is *still waiting* after R2 has come and gone, and
/// only completes once R1 (the actual old-phase reader) is released.
#[test]
fn two_readers_phase_alternation() {
    register_thread();
    let cell = Arc::new(RcuCell::new(0usize));

    let r1_entered = Arc::new(std::sync::Barrier::new(2));
    let r1_entered2 = r1_entered.clone();
    let r1_release = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r1_release2 = r1_release.clone();

    // R1 enters during the current (old) phase and holds the critical
    // section open until told to leave.
    let r1 = thread::spawn(move || {
        register_thread();
        read_lock();
        r1_entered2.wait();
        while !r1_release2.load(std::sync::atomic::Ordering::Acquire) {
            thread::yield_now();
        }
        read_unlock();
        unregister_thread();
    });
    r1_entered.wait();

    // The writer's first flip happens as soon as it acquires the registry
    // mutex; its phase-1 wait then blocks on R1 alone.
    let writer = thread::spawn(synchronize_rcu);
    thread::sleep(std::time::Duration::from_millis(20));

    // R2 enters (and fully exits) after the flip, in the new phase. Phase-1
    // targets only readers snapshotted under the old phase, so R2 coming and
    // going here must not be something the writer's current wait depends on.
    let cell_r2 = cell.clone();
    let r2 = thread::spawn(move || {
        register_thread();
        let g = cell_r2.read();
        assert_eq!(*g, 0);
        drop(g);
        unregister_thread();
    });
    r2.join().unwrap();

    // The writer must still be parked on R1: R2 entering and exiting did not
    // satisfy its phase-1 wait.
    assert!(!writer.is_finished());

    // Releasing R1 lets phase 1 complete; phase 2 then targets R2's phase,
    // but R2 has already exited, so synchronize_rcu returns without anyone
    // left to wait on.
    r1_release.store(true, std::sync::atomic::Ordering::Release);
    r1.join().unwrap();
    writer.join().unwrap();

    unregister_thread();
}

/// Scenario 4: registry overflow. `Vec`'s own growth makes this trivially
/// true, but we still exercise registering more threads than any small
/// initial capacity and confirm every one of them is visible to a
/// concurrent `synchronize_rcu`.
#[test]
fn registry_overflow_all_visible() {
    const N: usize = 32;
    let barrier = Arc::new(std::sync::Barrier::new(N + 1));
    let mut handles = Vec::with_capacity(N);

    for _ in 0..N {
        let b = barrier.clone();
        handles.push(thread::spawn(move || {
            register_thread();
            read_lock();
            b.wait();
            thread::sleep(std::time::Duration::from_millis(10));
            read_unlock();
            unregister_thread();
        }));
    }

    barrier.wait();
    synchronize_rcu();

    for h in handles {
        h.join().unwrap();
    }
}
