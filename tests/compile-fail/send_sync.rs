// Check that cells over non-Sync types can't be sent between threads.
// edition:2021

use std::cell::RefCell;
use std::thread;

use gprcu::{register_thread, RcuCell};

// NOTE: we include this so the error points to local source which gives reliable trybuild output
fn spawn<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(f).join().unwrap();
}

fn main() {
    register_thread();
    let cell = RcuCell::new(RefCell::new(0));

    spawn(move || {
        *cell.read().borrow_mut() = 1;
    });
    //~^ ERROR: `RefCell<i32>` cannot be shared between threads safely
}
