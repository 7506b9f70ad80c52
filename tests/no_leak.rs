//! Confirms `RcuCell::replace` hands back exactly the value it supersedes,
//! with no extra clones retained (teacher precedent: `local-rcu`'s
//! `no_leak` test, adapted from its per-slot epoch tracking to this crate's
//! global grace-period wait).

use gprcu::{register_thread, unregister_thread, RcuCell};
use std::sync::Arc;

#[test]
fn no_leak() {
    register_thread();

    let vals = [Arc::new(1), Arc::new(2), Arc::new(3)];
    let cell = RcuCell::new(vals[0].clone());

    assert_eq!(Arc::strong_count(&vals[0]), 2);
    let old = cell.replace(vals[1].clone());
    assert_eq!(**old, 1);
    drop(old);
    assert_eq!(Arc::strong_count(&vals[0]), 1);
    assert_eq!(Arc::strong_count(&vals[1]), 2);

    let old = cell.replace(vals[2].clone());
    assert_eq!(**old, 2);
    drop(old);
    assert_eq!(Arc::strong_count(&vals[1]), 1);
    assert_eq!(Arc::strong_count(&vals[2]), 2);

    drop(cell);
    assert_eq!(Arc::strong_count(&vals[2]), 1);

    unregister_thread();
}
