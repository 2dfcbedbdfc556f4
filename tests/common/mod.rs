//! Shared setup for the integration tests.

use cnx_sync::MutexInterface;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::thread;

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Lock `mutex` from `threads` threads, `rounds` times each, and check that
/// no two of them are ever inside at once. Returns the number of critical
/// sections entered.
#[allow(dead_code)]
pub fn hammer(mutex: MutexInterface<'_>, threads: usize, rounds: usize) -> usize {
    let inside = AtomicUsize::new(0);
    let total = AtomicUsize::new(0);

    thread::scope(|s| {
        for seed in 0..threads {
            let inside = &inside;
            let total = &total;
            s.spawn(move || {
                let mut rng = XorShiftRng::seed_from_u64(seed as u64);
                for _ in 0..rounds {
                    mutex.lock();
                    assert_eq!(inside.fetch_add(1, SeqCst), 0, "two threads inside");

                    // A non-atomic read-modify-write that tears if exclusion
                    // is broken.
                    let seen = total.load(SeqCst);
                    if rng.gen_ratio(1, 8) {
                        thread::yield_now();
                    }
                    total.store(seen + 1, SeqCst);

                    inside.fetch_sub(1, SeqCst);
                    mutex.unlock();
                }
            });
        }
    });

    total.into_inner()
}
