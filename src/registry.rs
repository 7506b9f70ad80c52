//! Reader registry: per-thread state allocation, thread-local handle, and
//! the process-wide table the writer scans during `synchronize_rcu`.
//!
//! spec.md §4.5 calls for "an append-grown contiguous array of records
//! ... mutations serialized by the global mutex ... removal uses
//! swap-with-last". `Vec::swap_remove` already is swap-with-last, and
//! `Vec`'s own amortized-doubling growth already is "capacity doubles on
//! overflow", so the registry itself is a thin `Mutex<Vec<RegistryEntry>>`
//! rather than a hand-rolled growable array.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;

use crate::rcu::contract_violation;

/// Per-thread state reached through a stable pointer.
///
/// `thread_local!` storage addresses are not guaranteed stable by Rust (only
/// by the platform's actual implementation), so per spec.md's Design Notes
/// we heap-allocate this block once at registration and hand out its raw
/// address, both to the registry and to this thread's own TLS cell. The
/// block is reclaimed in `unregister_thread`.
pub(crate) struct ReaderState {
    pub(crate) active_depth: AtomicUsize,
    #[cfg_attr(not(feature = "signal-mb"), allow(dead_code))]
    pub(crate) need_mb: AtomicBool,
}

impl ReaderState {
    fn new() -> Self {
        ReaderState {
            active_depth: AtomicUsize::new(0),
            need_mb: AtomicBool::new(false),
        }
    }
}

pub(crate) struct RegistryEntry {
    pub(crate) state: *const ReaderState,
    #[cfg(feature = "signal-mb")]
    pub(crate) os_thread: libc::pthread_t,
}

// The registry is only ever touched with the global mutex held, and the
// `ReaderState` it points at is itself all atomics, so sending entries
// across threads (which only happens in the sense that the writer thread
// reads entries owned by other threads) is sound.
unsafe impl Send for RegistryEntry {}

static REGISTRY: OnceLock<Mutex<Vec<RegistryEntry>>> = OnceLock::new();

thread_local! {
    static READER_STATE: Cell<*const ReaderState> = const { Cell::new(std::ptr::null()) };
}

/// Lock the registry, lazily creating it on first use.
///
/// This is the one process-wide mutex spec.md §3/§4.5 describes: it
/// serializes registry mutations *and* excludes writers from each other,
/// since `synchronize_rcu` holds this same lock across the whole grace
/// period (spec.md §4.3 step 1-10).
pub(crate) fn lock_registry() -> MutexGuard<'static, Vec<RegistryEntry>> {
    REGISTRY
        .get_or_init(|| Mutex::new(Vec::new()))
        .lock()
        .unwrap_or_else(|_| contract_violation("rcu: global mutex poisoned"))
}

/// Returns this thread's `ReaderState`, or aborts if the thread never called
/// `register_thread` (spec.md §7: programmer contract violation is fatal).
pub(crate) fn current_state() -> *const ReaderState {
    let ptr = READER_STATE.with(Cell::get);
    if ptr.is_null() {
        contract_violation("rcu: read_lock/read_unlock called by an unregistered thread");
    }
    ptr
}

/// Same lookup, but used from inside the `signal-mb` signal handler: never
/// aborts (a signal handler must not call into an abort/print path that
/// isn't async-signal-safe), just returns null if this thread is somehow
/// unregistered.
#[cfg(feature = "signal-mb")]
pub(crate) fn current_state_for_signal_handler() -> *const ReaderState {
    READER_STATE.with(Cell::get)
}

/// Registers the calling thread as an RCU reader.
///
/// Idempotency is not part of the contract (spec.md §4.5's state machine
/// only defines `register_thread` from the *unregistered* state); calling it
/// twice on the same thread is a contract violation like any other misuse.
pub fn register_thread() {
    if !READER_STATE.with(Cell::get).is_null() {
        contract_violation("rcu: register_thread called by an already-registered thread");
    }

    crate::signal::install_handler_once();

    let state = Box::into_raw(Box::new(ReaderState::new()));
    let entry = RegistryEntry {
        state,
        #[cfg(feature = "signal-mb")]
        os_thread: unsafe { libc::pthread_self() },
    };

    let mut registry = lock_registry();
    registry.push(entry);
    drop(registry);

    READER_STATE.with(|c| c.set(state));
}

/// Unregisters the calling thread. Must be called at nesting depth 0
/// (spec.md §4.5: "only registered, depth=0 is a safe point").
pub fn unregister_thread() {
    let state = READER_STATE.with(Cell::get);
    if state.is_null() {
        contract_violation("rcu: unregister_thread called by an unregistered thread");
    }
    if unsafe { &*state }.active_depth.load(std::sync::atomic::Ordering::Relaxed) != 0 {
        contract_violation("rcu: unregister_thread called while inside a read-side critical section");
    }

    let mut registry = lock_registry();
    let idx = registry
        .iter()
        .position(|e| e.state == state)
        .unwrap_or_else(|| contract_violation("rcu: unregister_thread: thread not in registry"));
    registry.swap_remove(idx);
    drop(registry);

    READER_STATE.with(|c| c.set(std::ptr::null()));
    // SAFETY: removed from the registry under the mutex above, and we are
    // the thread that owned this pointer (per-thread TLS cell), so no
    // concurrent access to `state` can occur: `synchronize_rcu` takes a
    // snapshot of the registry under the same mutex and never touches an
    // entry after that snapshot is taken.
    drop(unsafe { Box::from_raw(state as *mut ReaderState) });
}

/// Returns this thread's name (or a debug-formatted id if unnamed), used only
/// to annotate [`crate::rcu::contract_violation`]'s diagnostic.
pub(crate) fn current_thread_name() -> String {
    thread::current()
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{:?}", thread::current().id()))
}
