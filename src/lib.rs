//! Userspace read-copy-update (RCU) synchronization.
//!
//! Many reader threads traverse shared pointer-based data structures with
//! wait-free, non-blocking reads. A writer publishes a new value and then
//! calls [`synchronize_rcu`] to wait until every reader that could have seen
//! the old value has left its read-side critical section at least once,
//! after which the old value can be reclaimed.
//!
//! ```
//! use gprcu::{register_thread, unregister_thread, RcuCell};
//!
//! register_thread();
//! let cell = RcuCell::new(1usize);
//! {
//!     let g = cell.read();
//!     assert_eq!(*g, 1);
//! }
//! cell.replace(2);
//! assert_eq!(*cell.read(), 2);
//! unregister_thread();
//! ```
//!
//! # Fence-coercion strategy
//!
//! Exactly one of the `signal-mb` (default) or `full-mb` Cargo features must
//! be enabled. `signal-mb` keeps `read_lock`/`read_unlock` fence-free by
//! borrowing a hardware fence from every reader via a directed signal
//! whenever a writer calls `synchronize_rcu`. `full-mb` is the portable
//! fallback: every `read_lock` issues an explicit full fence and no signal
//! is ever sent.
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(all(feature = "signal-mb", feature = "full-mb"))]
compile_error!("enable exactly one of the `signal-mb` or `full-mb` features, not both");

#[cfg(not(any(feature = "signal-mb", feature = "full-mb")))]
compile_error!("enable exactly one of the `signal-mb` or `full-mb` features");

mod cell;
mod ordering;
mod queue;
mod rcu;
mod registry;
mod signal;

pub use cell::{critical_section, CriticalSection, ReadGuard, RcuCell};
pub use queue::Queue;
pub use rcu::{
    assign_pointer, dereference, publish_content, read_lock, read_unlock, register_thread,
    synchronize_rcu, unregister_thread, xchg_pointer,
};
