//! A safe, ergonomic facade over the free-function RCU API in [`crate::rcu`],
//! in the spirit of the teacher crate's `Writer`/`Reader`/`ReadGuard` split:
//! the raw contract-based functions from spec.md §6 stay public for callers
//! that need them directly (FFI, signal handlers), while most users just
//! want a `Cell`-like type.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::rcu;

/// A single RCU-protected value.
///
/// Any number of threads may call [`RcuCell::read`] concurrently and
/// wait-free. [`RcuCell::replace`] installs a new value and blocks (via
/// [`crate::synchronize_rcu`]) until every reader holding the old value has
/// dropped its guard, then hands the old value back to the caller.
///
/// The calling thread must have called [`crate::register_thread`] before
/// the first `read`/`replace`, exactly as for the raw API.
pub struct RcuCell<T> {
    slot: AtomicPtr<T>,
}

unsafe impl<T: Send + Sync> Send for RcuCell<T> {}
unsafe impl<T: Send + Sync> Sync for RcuCell<T> {}

impl<T> RcuCell<T> {
    /// Creates a new cell holding `value`.
    pub fn new(value: T) -> Self {
        let ptr = Box::into_raw(Box::new(value));
        let slot = AtomicPtr::new(std::ptr::null_mut());
        rcu::assign_pointer(&slot, ptr);
        RcuCell { slot }
    }

    /// Enters a read-side critical section and returns a guard dereferencing
    /// to the current value. Dropping the guard leaves the critical section.
    pub fn read(&self) -> ReadGuard<'_, T> {
        rcu::read_lock();
        // SAFETY: we are inside the critical section just entered above,
        // and the guard's lifetime (tied to `&self`) ends the section
        // before `self` can be replaced again from this borrow's view.
        let ptr = unsafe { rcu::dereference(&self.slot) };
        ReadGuard { _cell: self, ptr }
    }

    /// Installs `value` as the new current value and returns the previous
    /// one, after a grace period has elapsed (so it is safe to drop
    /// immediately). Blocks the caller; see [`crate::synchronize_rcu`].
    pub fn replace(&self, value: T) -> Box<T> {
        let new = Box::into_raw(Box::new(value));
        let old = rcu::publish_content(&self.slot, new);
        // SAFETY: `old` was installed by a previous `assign_pointer`/
        // `publish_content` call on this same slot, and `synchronize_rcu`
        // inside `publish_content` has just proven no reader can still be
        // holding a reference to it.
        unsafe { Box::from_raw(old) }
    }
}

impl<T> Drop for RcuCell<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` proves no reader guard can be outstanding.
        drop(unsafe { Box::from_raw(self.slot.load(Ordering::Relaxed)) });
    }
}

/// Grants access to the value an [`RcuCell::read`] observed.
///
/// Must not outlive the thread that created it; holding it across a thread
/// boundary would let `read_unlock` run on the wrong thread's
/// `active_depth`. The raw pointer field already makes this type
/// `!Send`/`!Sync`.
pub struct ReadGuard<'a, T> {
    _cell: &'a RcuCell<T>,
    ptr: *const T,
}

impl<'a, T> Deref for ReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.ptr }
    }
}

impl<'a, T> Drop for ReadGuard<'a, T> {
    fn drop(&mut self) {
        rcu::read_unlock();
    }
}

/// A bare read-side critical section not tied to any particular
/// [`RcuCell`], for code that calls [`crate::dereference`] on its own
/// pointers directly.
pub struct CriticalSection {
    _not_send: PhantomData<*const ()>,
}

/// Enters a read-side critical section. Equivalent to calling
/// [`crate::read_lock`] directly, but pairs the matching
/// [`crate::read_unlock`] with the returned guard's `Drop`.
pub fn critical_section() -> CriticalSection {
    rcu::read_lock();
    CriticalSection {
        _not_send: PhantomData,
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        rcu::read_unlock();
    }
}
