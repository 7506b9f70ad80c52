//! Cross-thread fence coercion (spec.md §4.4).
//!
//! To keep `read_lock`/`read_unlock` fence-free, the writer "borrows" a
//! fence from every reader by interrupting it: each reader's signal handler
//! executes a full fence on the writer's behalf. This module is the only
//! place that depends on `libc`, and only exists when the `signal-mb`
//! feature is selected; `full-mb` builds use the fallback at the bottom of
//! this file instead, where `force_mb_all_threads` is a single local fence.

#[cfg(feature = "signal-mb")]
mod imp {
    use std::sync::atomic::Ordering;
    use std::sync::Once;
    use std::time::Duration;

    use crate::ordering::{cache_flush_fence, fence_full};
    use crate::registry::RegistryEntry;

    #[cfg(target_os = "linux")]
    fn urcu_signal() -> libc::c_int {
        // SIGRTMIN is a function (not a constant) on Linux because the
        // kernel reserves a platform-dependent number of low real-time
        // signals for the C library itself.
        unsafe { libc::SIGRTMIN() + 1 }
    }

    #[cfg(not(target_os = "linux"))]
    fn urcu_signal() -> libc::c_int {
        libc::SIGUSR1
    }

    extern "C" fn handler(_sig: libc::c_int) {
        // Async-signal-safe: a full fence and a relaxed store to this
        // thread's own already-initialized TLS cell, nothing else.
        fence_full();
        let state = crate::registry::current_state_for_signal_handler();
        if !state.is_null() {
            unsafe { &*state }.need_mb.store(false, Ordering::SeqCst);
        }
        fence_full();
    }

    static INSTALL: Once = Once::new();

    /// Installs the `SIGURCU`-equivalent handler once per process, on first
    /// `register_thread` (spec.md §4.5).
    pub(crate) fn install_handler_once() {
        INSTALL.call_once(|| unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = handler as usize;
            sa.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut sa.sa_mask);
            if libc::sigaction(urcu_signal(), &sa, std::ptr::null_mut()) != 0 {
                crate::rcu::contract_violation("rcu: failed to install fence-coercion signal handler");
            }
        });
    }

    /// Forces a full fence on every registered reader and waits for
    /// acknowledgement, resending every ~1ms in case the signal is lost
    /// (spec.md §4.4). This is the mandatory per-grace-period coercion
    /// `synchronize_rcu` issues at steps 1 and 9: it is what lets
    /// `read_lock`/`read_unlock` get away with a compiler barrier instead of
    /// a hardware fence on the fast path. Caller must already hold the
    /// registry mutex (the Open Question in spec.md §9: the single-thread
    /// forced-fence path below still needs the registry lock, even though it
    /// only targets one reader at a time).
    pub(crate) fn force_mb_all_threads(entries: &[RegistryEntry]) {
        for entry in entries {
            force_mb_one(entry);
        }
        fence_full();
    }

    /// Forces a fence on a single reader: the back-off kick
    /// `wait_for_reader` issues after `KICK_READER_LOOPS` idle spins
    /// (spec.md §4.3's back-off policy). This is a latency optimization for
    /// a specific laggard, distinct from the mandatory full-registry
    /// coercion above that every grace period performs regardless of
    /// whether any reader stalls.
    pub(crate) fn force_mb_one_reader(entry: &RegistryEntry) {
        force_mb_one(entry);
    }

    fn force_mb_one(entry: &RegistryEntry) {
        let state = unsafe { &*entry.state };
        state.need_mb.store(true, Ordering::SeqCst);
        cache_flush_fence();

        loop {
            if unsafe { libc::pthread_kill(entry.os_thread, urcu_signal()) } != 0 {
                crate::rcu::contract_violation("rcu: pthread_kill failed while forcing a reader fence");
            }
            // Give the target thread a chance to run its handler before
            // checking; resend on the next iteration if it hasn't yet
            // (covers a dropped/coalesced signal).
            std::thread::sleep(Duration::from_millis(1));
            if !state.need_mb.load(Ordering::SeqCst) {
                break;
            }
        }
    }
}

#[cfg(not(feature = "signal-mb"))]
mod imp {
    use crate::ordering::fence_full;
    use crate::registry::RegistryEntry;

    pub(crate) fn install_handler_once() {}

    /// `full-mb` variant: every reader already fences on every `read_lock`,
    /// so there is nothing to force and nobody to signal — `gp_ctr`'s new
    /// value is visible to a reader the moment it next checks, and a single
    /// local fence is enough to order the writer's own view (spec.md §9,
    /// `DEBUG_FULL_MB`).
    pub(crate) fn force_mb_all_threads(_entries: &[RegistryEntry]) {
        fence_full();
    }
}

pub(crate) use imp::{force_mb_all_threads, install_handler_once};
#[cfg(feature = "signal-mb")]
pub(crate) use imp::force_mb_one_reader;
