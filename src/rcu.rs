//! The RCU core: the generation counter, reader fast path, publication
//! helpers, and the grace-period algorithm (spec.md §4.1-§4.3).

use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
#[cfg(not(feature = "signal-mb"))]
use std::time::Duration;

use crate::ordering::{fence_full, reader_barrier, store_shared};
use crate::registry::{self, ReaderState};
pub use crate::registry::{register_thread, unregister_thread};

/// The nesting constant (`GP_COUNT`): added to `active_depth` on every
/// nested `read_lock`, subtracted on every `read_unlock`.
const GP_COUNT: usize = 1;

/// The parity bit (`GP_PHASE_BIT`): the high bit of the word, flipped twice
/// per grace period by `synchronize_rcu`.
const GP_PHASE_BIT: usize = 1 << (usize::BITS - 1);

/// How many spin iterations `synchronize_rcu`'s wait phases tolerate before
/// calling out to force a fence on the one laggard reader (spec.md §4.3
/// back-off policy; `KICK_READER_LOOPS` in the original design).
const KICK_READER_LOOPS: u32 = 10_000;

static GP_CTR: AtomicUsize = AtomicUsize::new(GP_COUNT);

/// Aborts the process after reporting a programmer contract violation.
///
/// spec.md §7 is explicit that these are fatal and never surfaced to the
/// caller as a `Result`: the reader fast path must not branch on an error
/// path, and there is no recoverable way to continue once e.g. a thread
/// calls `read_unlock` without a matching `read_lock`.
pub(crate) fn contract_violation(msg: &str) -> ! {
    eprintln!(
        "gprcu: fatal: {msg} (thread: {})",
        registry::current_thread_name()
    );
    std::process::abort();
}

/// Enter a (possibly nested) read-side critical section.
///
/// Wait-free, non-blocking, signal-safe: on the outermost entry this stores
/// a snapshot of `gp_ctr`'s current value (which carries both `GP_COUNT`,
/// making `active_depth` non-zero, and the phase bit) into `active_depth`;
/// on a nested entry it only adds `GP_COUNT`, preserving the snapshot.
///
/// # Panics / aborts
///
/// Aborts the process if the calling thread never called
/// [`register_thread`].
#[inline]
pub fn read_lock() {
    let state = unsafe { &*registry::current_state() };
    let depth = state.active_depth.load(Ordering::Relaxed);
    if depth == 0 {
        let gp = GP_CTR.load(Ordering::Relaxed);
        state.active_depth.store(gp, Ordering::Relaxed);
    } else {
        state.active_depth.store(depth + GP_COUNT, Ordering::Relaxed);
    }
    reader_barrier();
}

/// Leave one level of a read-side critical section.
///
/// # Panics / aborts
///
/// Aborts the process if the calling thread never called
/// [`register_thread`], or if called at nesting depth 0.
#[inline]
pub fn read_unlock() {
    reader_barrier();
    let state = unsafe { &*registry::current_state() };
    let depth = state.active_depth.load(Ordering::Relaxed);
    if depth < GP_COUNT {
        contract_violation("rcu: read_unlock called without a matching read_lock");
    }
    state.active_depth.store(depth - GP_COUNT, Ordering::Relaxed);
}

/// Acquire-load a pointer slot published via [`assign_pointer`],
/// [`xchg_pointer`], or [`publish_content`].
///
/// # Safety
///
/// Must only be called from inside a read-side critical section
/// ([`read_lock`]/[`read_unlock`]), and the returned pointer is only valid
/// to dereference until that critical section ends.
#[inline]
pub unsafe fn dereference<T>(slot: &AtomicPtr<T>) -> *const T {
    slot.load(Ordering::Acquire) as *const T
}

/// Publish a freshly constructed value with no prior value to reclaim
/// (spec.md §4.2): a write fence followed by a release-store.
#[inline]
pub fn assign_pointer<T>(slot: &AtomicPtr<T>, value: *mut T) {
    fence_full();
    store_shared(slot, value);
}

/// Atomically swap in a new value, returning the old one. The caller owns
/// the returned pointer and must not reclaim it until a grace period has
/// elapsed (spec.md §4.2).
#[inline]
pub fn xchg_pointer<T>(slot: &AtomicPtr<T>, value: *mut T) -> *mut T {
    slot.swap(value, Ordering::AcqRel)
}

/// `xchg_pointer` followed by [`synchronize_rcu`]: on return, the old value
/// is safe to reclaim immediately (spec.md §4.2).
#[inline]
pub fn publish_content<T>(slot: &AtomicPtr<T>, value: *mut T) -> *mut T {
    let old = xchg_pointer(slot, value);
    synchronize_rcu();
    old
}

/// `(active_depth XOR gp_ctr) & GP_PHASE_BIT == 0`, i.e. either the reader
/// is outside any critical section, or its snapshot matches the *current*
/// parity of `gp_ctr` (spec.md §4.3 step 4/8's wait predicate).
#[inline]
fn reader_has_left_old_phase(active_depth: usize, gp_ctr: usize) -> bool {
    active_depth == 0 || (active_depth ^ gp_ctr) & GP_PHASE_BIT == 0
}

/// Wait for one reader to leave the old phase, with spin/kick back-off.
/// Returns once the predicate holds.
#[cfg_attr(not(feature = "signal-mb"), allow(unused_variables))]
fn wait_for_reader(state: &ReaderState, entry: &registry::RegistryEntry) {
    let mut spins: u32 = 0;
    loop {
        let depth = state.active_depth.load(Ordering::Acquire);
        let gp = GP_CTR.load(Ordering::Acquire);
        if reader_has_left_old_phase(depth, gp) {
            return;
        }

        spins += 1;
        if spins >= KICK_READER_LOOPS {
            spins = 0;
            #[cfg(feature = "signal-mb")]
            crate::signal::force_mb_one_reader(entry);
            #[cfg(not(feature = "signal-mb"))]
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

/// Waits until every registered reader has been observed outside the old
/// phase at least once (spec.md §4.3 steps 4 and 8).
fn wait_for_all_readers(registry: &[registry::RegistryEntry]) {
    for entry in registry {
        wait_for_reader(unsafe { &*entry.state }, entry);
    }
}

/// Proves that every read-side critical section that began before this call
/// has completed at least once, then returns.
///
/// Implements spec.md §4.3's two-flip grace-period protocol: because a
/// reader only snapshots `gp_ctr`'s parity at its *outermost* entry, a
/// single flip cannot distinguish "was already reading old data published
/// before this call" from "started reading after the flip, using the new
/// parity, but still sees pre-publication data due to a race between the
/// flip and the writer's own fence". Flipping twice and waiting after each
/// flip closes that gap.
///
/// Acquires the global registry mutex for the duration of the call, which
/// both excludes other writers (spec.md §4.3: "with global mutex held") and
/// keeps the registry stable while it is scanned.
pub fn synchronize_rcu() {
    let registry_guard = registry::lock_registry();

    // Step 1: any publication store issued by this writer before this call
    // must be visible before the parity change below is observable. Every
    // registered reader's fast path relies on this, not just this writer's
    // own view, so this is the registry-wide coercion from spec.md §4.4, not
    // a local fence.
    crate::signal::force_mb_all_threads(&registry_guard);

    // Step 2: flip 1.
    GP_CTR.fetch_xor(GP_PHASE_BIT, Ordering::Release);

    // Step 3.
    fence_full();

    // Step 4: wait phase 1.
    wait_for_all_readers(&registry_guard);

    // Step 5.
    fence_full();

    // Step 6: flip 2.
    GP_CTR.fetch_xor(GP_PHASE_BIT, Ordering::Release);

    // Step 7.
    fence_full();

    // Step 8: wait phase 2.
    wait_for_all_readers(&registry_guard);

    // Step 9: no speculative access to soon-to-be-reclaimed memory may leak
    // past this point, on any registered reader's view, not just this
    // writer's — the same registry-wide coercion as step 1.
    crate::signal::force_mb_all_threads(&registry_guard);

    // Step 10: mutex released when `registry_guard` drops.
}
