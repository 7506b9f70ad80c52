//! Memory-ordering primitives the rest of the crate is built from.
//!
//! These are thin, named wrappers over `core::sync::atomic` rather than a
//! fresh abstraction: on every target this crate supports, a "full fence"
//! and a "compiler-only barrier" are the two primitives the grace-period
//! algorithm actually needs, so that's all this module provides.

use cfg_if::cfg_if;
use std::sync::atomic::{self, Ordering};

// `xchg`/`load_acquire` are the two primitives `queue.rs` builds its
// wait-free linked list from, and `tests/loom.rs` model-checks that queue —
// so, same as the teacher's own `#[cfg(loom)] use loom::sync::atomic`/
// `#[cfg(not(loom))] use std::sync::atomic` split, these two functions (and
// only these two: the RCU core is not loom-modeled, see DESIGN.md) operate
// on loom's shadow atomics under `cfg(loom)` instead of the real ones.
#[cfg(loom)]
use loom::sync::atomic as qatomic;
#[cfg(not(loom))]
use std::sync::atomic as qatomic;

/// A full hardware memory fence, visible to every CPU in the system.
///
/// Used by the writer around each phase of [`crate::synchronize_rcu`]'s
/// two-flip protocol (spec.md §4.3).
#[inline]
pub fn fence_full() {
    atomic::fence(Ordering::SeqCst);
}

/// A compiler-only reordering barrier: prevents the compiler from moving
/// loads/stores across this point, but emits no CPU fence instruction.
///
/// This is what [`crate::read_lock`]/[`crate::read_unlock`] use on the
/// `signal-mb` fast path: the writer borrows the missing hardware fence from
/// the reader via [`crate::signal`] instead of paying for one on every call.
#[inline]
pub fn compiler_barrier() {
    atomic::compiler_fence(Ordering::SeqCst);
}

/// The barrier `read_lock`/`read_unlock` issue between updating
/// `active_depth` and touching RCU-protected data.
///
/// Behind `full-mb` this is a real hardware fence (so every reader has an
/// up-to-date view with no cooperation from the writer). Behind `signal-mb`
/// it is compiler-only, and correctness instead relies on the writer
/// forcing a fence on each reader before trusting its `active_depth`
/// snapshot (spec.md §4.4).
#[inline]
pub fn reader_barrier() {
    cfg_if! {
        if #[cfg(feature = "full-mb")] {
            fence_full();
        } else {
            compiler_barrier();
        }
    }
}

/// On cache-incoherent targets a full fence alone does not guarantee a
/// dirtied cache line is observed promptly by other cores; an extra
/// cache-flush fence is issued before signalling a reader so the `need_mb`
/// write is visible before the signal arrives (spec.md §4.4). On the
/// cache-coherent targets this crate actually ships for, a full fence
/// already implies this, so the two are the same operation.
#[inline]
pub fn cache_flush_fence() {
    atomic::fence(Ordering::SeqCst);
}

/// Atomic exchange: store `val` into `slot`, returning the previous value.
///
/// Full-fence (`AcqRel`) ordering, matching spec.md §4.6's
/// `old_tail <- xchg(&q.tail, &new.next)`. Used only by [`crate::queue`],
/// so `slot`'s type tracks loom's shadow `AtomicPtr` under `cfg(loom)`.
#[inline]
pub fn xchg<T>(slot: &qatomic::AtomicPtr<T>, val: *mut T) -> *mut T {
    slot.swap(val, qatomic::Ordering::AcqRel)
}

/// Release-store `val` into `slot`. Pairs with [`load_acquire`] and is what
/// [`crate::rcu::assign_pointer`] is built from (spec.md §4.2); not on the
/// loom-modeled path, so this stays on the real atomics unconditionally.
#[inline]
pub fn store_shared<T>(slot: &atomic::AtomicPtr<T>, val: *mut T) {
    slot.store(val, Ordering::Release);
}

/// Acquire-load `slot`. Used only by [`crate::queue`]'s wait-for-next loop,
/// so like [`xchg`] it tracks loom's shadow `AtomicPtr` under `cfg(loom)`.
#[inline]
pub fn load_acquire<T>(slot: &qatomic::AtomicPtr<T>) -> *mut T {
    slot.load(qatomic::Ordering::Acquire)
}
